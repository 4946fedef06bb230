use std::sync::Arc;

use hydros_coordination::Outbox;
use hydros_protocol::*;
use hydros_state::StateManager;

use crate::error::AgentError;

/// Lifecycle of one agent instance within one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed, not yet registered.
    Init,
    /// Registered globally and locally; receives the task's commands.
    Active,
    /// A callback failed. Still receives commands until terminated.
    Failed,
    /// Unregistered; receives nothing.
    Terminated,
}

/// Identity and plumbing shared by every agent kind: the wire instance,
/// its lifecycle state, the state manager and the outbox replies go to.
pub struct AgentCore {
    instance: AgentInstance,
    lifecycle: LifecycleState,
    state: Arc<StateManager>,
    outbox: Outbox,
}

impl AgentCore {
    /// New instance for `context` with a freshly generated agent ID. Cluster
    /// and node identity come from the state manager.
    pub fn new(
        definition: AgentDefinition,
        drive_mode: AgentDriveMode,
        context: &SimulationContext,
        state: Arc<StateManager>,
        outbox: Outbox,
    ) -> Self {
        let instance = AgentInstance {
            agent_id: generate_agent_instance_id(&definition.agent_code),
            definition,
            biz_scene_instance_id: context.biz_scene_instance_id.clone(),
            cluster_id: state.cluster_id().unwrap_or_default(),
            node_id: state.node_id().unwrap_or_default(),
            context: context.clone(),
            biz_status: AgentBizStatus::Init,
            drive_mode,
        };
        Self {
            instance,
            lifecycle: LifecycleState::Init,
            state,
            outbox,
        }
    }

    pub fn instance(&self) -> &AgentInstance {
        &self.instance
    }

    pub fn agent_id(&self) -> &str {
        &self.instance.agent_id
    }

    pub fn agent_code(&self) -> &str {
        self.instance.agent_code()
    }

    pub fn context(&self) -> &SimulationContext {
        &self.instance.context
    }

    pub fn drive_mode(&self) -> AgentDriveMode {
        self.instance.drive_mode
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Active or failed: still takes part in the task.
    pub fn is_live(&self) -> bool {
        matches!(self.lifecycle, LifecycleState::Active | LifecycleState::Failed)
    }

    pub fn configuration_url(&self) -> &str {
        &self.instance.definition.agent_configuration_url
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// This agent's entry in a task-init request's agent list.
    pub fn resolve_definition<'a>(&self, request: &'a TaskInitRequest) -> Option<&'a AgentDefinition> {
        request
            .agent_list
            .iter()
            .find(|def| def.agent_code == self.instance.definition.agent_code)
    }

    /// Adopt the configuration reference and names the coordinator sent for
    /// this agent kind.
    pub(crate) fn adopt_definition(&mut self, definition: &AgentDefinition) {
        let current = &mut self.instance.definition;
        if !definition.agent_configuration_url.is_empty() {
            current.agent_configuration_url = definition.agent_configuration_url.clone();
        }
        if current.agent_name.is_none() {
            current.agent_name = definition.agent_name.clone();
        }
        if current.agent_type.is_empty() {
            current.agent_type = definition.agent_type.clone();
        }
    }

    /// Register globally and as local, before `on_init` runs, so any
    /// response the agent produces is eligible for sending.
    pub(crate) fn enlist(&mut self) {
        self.state.register_agent_instance(&self.instance);
        self.state.add_local_agent(&self.instance);
    }

    pub(crate) fn activate(&mut self) {
        self.lifecycle = LifecycleState::Active;
        self.set_biz_status(AgentBizStatus::Active);
        tracing::info!(agent_id = %self.instance.agent_id, "Agent active");
    }

    /// Enter FAILED. Sticky until the agent is retired.
    pub(crate) fn mark_failed(&mut self, error: &AgentError) {
        if self.lifecycle != LifecycleState::Failed {
            tracing::warn!(
                agent_id = %self.instance.agent_id,
                error_code = error.error_code(),
                error = %error.message,
                "Agent failed"
            );
        }
        self.lifecycle = LifecycleState::Failed;
        self.set_biz_status(AgentBizStatus::Failed);
    }

    /// Unregister now; the local registration is released through the
    /// outbox so responses already queued still go out.
    pub(crate) fn retire(&mut self) {
        self.lifecycle = LifecycleState::Terminated;
        self.state.unregister_agent_instance(&self.instance.agent_id);
        if !self.outbox.release_local(self.instance.clone()) {
            self.state.remove_local_agent(&self.instance);
        }
        tracing::info!(agent_id = %self.instance.agent_id, "Agent terminated");
    }

    fn set_biz_status(&mut self, status: AgentBizStatus) {
        self.instance.biz_status = status;
        self.state.update_agent_status(&self.instance.agent_id, status);
    }

    /// Outcome block for a reply sourced from this agent.
    pub fn outcome<T>(&self, result: &Result<T, AgentError>) -> Outcome {
        match result {
            Ok(_) => Outcome::succeed(self.instance.clone()),
            Err(e) => Outcome::failed(self.instance.clone(), e.error_code(), e.message.clone()),
        }
    }

    /// Queue a command sourced from this agent.
    pub fn send(&self, cmd: impl Into<SimCommand>) -> bool {
        self.outbox.enqueue(cmd)
    }

    /// Publish this agent's current status to its siblings.
    pub fn report_status(&self, status_message: Option<String>) -> bool {
        self.send(AgentInstanceStatusReport {
            header: CommandHeader::new(self.instance.context.clone()),
            outcome: Outcome::succeed(self.instance.clone()),
            status_message,
        })
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("agent_id", &self.instance.agent_id)
            .field("drive_mode", &self.instance.drive_mode)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
