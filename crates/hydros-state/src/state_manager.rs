use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;

use hydros_protocol::{AgentBizStatus, AgentInstance, SimulationContext};

/// Lifecycle of one simulation task as seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Initializing,
    Active,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskState {
    pub context_id: String,
    pub status: TaskStatus,
    pub agent_ids: Vec<String>,
    pub created_at: DateTime<Local>,
    pub terminated_at: Option<DateTime<Local>>,
}

impl TaskState {
    fn new(context_id: String, agent_ids: Vec<String>) -> Self {
        Self {
            context_id,
            status: TaskStatus::Initializing,
            agent_ids,
            created_at: Local::now(),
            terminated_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    cluster_id: Option<String>,
    node_id: Option<String>,
    active_contexts: HashSet<String>,
    agent_instances: HashMap<String, AgentInstance>,
    local_agent_ids: HashSet<String>,
    task_states: HashMap<String, TaskState>,
}

impl Registry {
    fn register(&mut self, agent: &AgentInstance) {
        self.agent_instances.insert(agent.agent_id.clone(), agent.clone());
    }

    fn is_local(&self, agent: &AgentInstance) -> bool {
        if !agent.agent_id.is_empty() {
            return self.local_agent_ids.contains(&agent.agent_id);
        }
        // Without an ID the node is the only hint left.
        match &self.node_id {
            Some(node) => !agent.node_id.is_empty() && &agent.node_id == node,
            None => false,
        }
    }
}

/// Registry of active task contexts and agent instances.
///
/// Every method takes `&self`; one mutex guards the whole registry and is
/// held only for the duration of a call. Invalid input (empty IDs) is
/// logged and ignored rather than reported, so filtering stays available.
#[derive(Debug, Default)]
pub struct StateManager {
    inner: Mutex<Registry>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// State manager pre-seeded with this process's cluster and node identity.
    pub fn with_identity(cluster_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        let state = Self::new();
        state.set_cluster_id(cluster_id);
        state.set_node_id(node_id);
        state
    }

    // ── Node identity ──

    pub fn set_cluster_id(&self, cluster_id: impl Into<String>) {
        let cluster_id = cluster_id.into();
        tracing::info!(cluster_id = %cluster_id, "Set cluster id");
        self.inner.lock().cluster_id = Some(cluster_id);
    }

    pub fn cluster_id(&self) -> Option<String> {
        self.inner.lock().cluster_id.clone()
    }

    pub fn set_node_id(&self, node_id: impl Into<String>) {
        let node_id = node_id.into();
        tracing::info!(node_id = %node_id, "Set node id");
        self.inner.lock().node_id = Some(node_id);
    }

    pub fn node_id(&self) -> Option<String> {
        self.inner.lock().node_id.clone()
    }

    // ── Contexts ──

    pub fn add_active_context(&self, context: &SimulationContext) {
        let id = context.id();
        if id.is_empty() {
            tracing::warn!("Ignoring context with empty id");
            return;
        }
        if self.inner.lock().active_contexts.insert(id.to_string()) {
            tracing::info!(context_id = %id, "Added active context");
        }
    }

    pub fn remove_active_context(&self, context: &SimulationContext) {
        let id = context.id();
        if id.is_empty() {
            return;
        }
        if self.inner.lock().active_contexts.remove(id) {
            tracing::info!(context_id = %id, "Removed active context");
        }
    }

    pub fn has_active_context(&self, context: &SimulationContext) -> bool {
        self.has_active_context_id(context.id())
    }

    pub fn has_active_context_id(&self, context_id: &str) -> bool {
        !context_id.is_empty() && self.inner.lock().active_contexts.contains(context_id)
    }

    pub fn active_contexts(&self) -> HashSet<String> {
        self.inner.lock().active_contexts.clone()
    }

    // ── Agent instances ──

    /// Register an instance by ID; re-registration overwrites.
    pub fn register_agent_instance(&self, agent: &AgentInstance) {
        if agent.agent_id.is_empty() {
            tracing::warn!(agent_code = %agent.agent_code(), "Cannot register agent without id");
            return;
        }
        self.inner.lock().register(agent);
        tracing::info!(agent_id = %agent.agent_id, "Registered agent instance");
    }

    pub fn unregister_agent_instance(&self, agent_id: &str) {
        if agent_id.is_empty() {
            return;
        }
        if self.inner.lock().agent_instances.remove(agent_id).is_some() {
            tracing::info!(agent_id = %agent_id, "Unregistered agent instance");
        }
    }

    pub fn get_agent_instance(&self, agent_id: &str) -> Option<AgentInstance> {
        self.inner.lock().agent_instances.get(agent_id).cloned()
    }

    /// Update the business status of a registered instance. Returns `false`
    /// when the instance is unknown.
    pub fn update_agent_status(&self, agent_id: &str, status: AgentBizStatus) -> bool {
        let mut inner = self.inner.lock();
        match inner.agent_instances.get_mut(agent_id) {
            Some(agent) => {
                agent.biz_status = status;
                tracing::debug!(agent_id = %agent_id, status = status.as_str(), "Updated agent status");
                true
            }
            None => {
                tracing::warn!(agent_id = %agent_id, "Cannot update status of unknown agent");
                false
            }
        }
    }

    pub fn get_agent_status(&self, agent_id: &str) -> Option<AgentBizStatus> {
        self.inner.lock().agent_instances.get(agent_id).map(|a| a.biz_status)
    }

    // ── Local vs remote ──

    pub fn add_local_agent(&self, agent: &AgentInstance) {
        if agent.agent_id.is_empty() {
            tracing::warn!(agent_code = %agent.agent_code(), "Cannot mark agent without id as local");
            return;
        }
        self.inner.lock().local_agent_ids.insert(agent.agent_id.clone());
        tracing::info!(agent_id = %agent.agent_id, "Registered local agent");
    }

    pub fn remove_local_agent(&self, agent: &AgentInstance) {
        if agent.agent_id.is_empty() {
            return;
        }
        if self.inner.lock().local_agent_ids.remove(&agent.agent_id) {
            tracing::info!(agent_id = %agent.agent_id, "Unregistered local agent");
        }
    }

    /// Whether `agent` is hosted by this process.
    ///
    /// The local ID set is authoritative: an instance with an ID is local
    /// only if that ID was added. The node ID comparison applies only to
    /// instances that carry no ID.
    pub fn is_local_agent(&self, agent: &AgentInstance) -> bool {
        self.inner.lock().is_local(agent)
    }

    pub fn is_remote_agent(&self, agent: &AgentInstance) -> bool {
        !self.is_local_agent(agent)
    }

    pub fn local_agent_count(&self) -> usize {
        self.inner.lock().local_agent_ids.len()
    }

    // ── Task lifecycle ──

    /// Create the task record, register its agents and activate the context.
    /// Runs under a single lock so no reader observes a half-initialized task.
    pub fn init_task(&self, context: &SimulationContext, agents: &[AgentInstance]) {
        let context_id = context.id();
        if context_id.is_empty() {
            tracing::warn!("Cannot init task: invalid context");
            return;
        }

        let agent_ids: Vec<String> = agents
            .iter()
            .filter(|a| !a.agent_id.is_empty())
            .map(|a| a.agent_id.clone())
            .collect();
        let agent_count = agent_ids.len();

        let mut inner = self.inner.lock();
        let mut task = TaskState::new(context_id.to_string(), agent_ids);
        for agent in agents.iter().filter(|a| !a.agent_id.is_empty()) {
            inner.register(agent);
        }
        inner.active_contexts.insert(context_id.to_string());
        task.status = TaskStatus::Active;
        inner.task_states.insert(context_id.to_string(), task);
        drop(inner);

        tracing::info!(context_id = %context_id, agents = agent_count, "Initialized task");
    }

    /// Deactivate a context. Idempotent; unknown contexts are only deactivated.
    pub fn terminate_task(&self, context: &SimulationContext) {
        let context_id = context.id();
        if context_id.is_empty() {
            tracing::warn!("Cannot terminate task: invalid context");
            return;
        }

        let mut inner = self.inner.lock();
        if let Some(task) = inner.task_states.get_mut(context_id) {
            if task.status != TaskStatus::Terminated {
                task.status = TaskStatus::Terminating;
                task.terminated_at = Some(Local::now());
            }
        }
        inner.active_contexts.remove(context_id);
        if let Some(task) = inner.task_states.get_mut(context_id) {
            task.status = TaskStatus::Terminated;
        }
        drop(inner);

        tracing::info!(context_id = %context_id, "Terminated task");
    }

    pub fn get_task_state(&self, context_id: &str) -> Option<TaskState> {
        self.inner.lock().task_states.get(context_id).cloned()
    }

    pub fn active_tasks(&self) -> Vec<TaskState> {
        self.inner
            .lock()
            .task_states
            .values()
            .filter(|t| t.status == TaskStatus::Active)
            .cloned()
            .collect()
    }

    /// Registered instances that joined the task for `context_id`.
    pub fn agents_for_context(&self, context_id: &str) -> Vec<AgentInstance> {
        let inner = self.inner.lock();
        let Some(task) = inner.task_states.get(context_id) else {
            return Vec::new();
        };
        task.agent_ids
            .iter()
            .filter_map(|id| inner.agent_instances.get(id).cloned())
            .collect()
    }

    /// Drop every context, task and instance. Node identity is kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.active_contexts.clear();
        inner.task_states.clear();
        inner.agent_instances.clear();
        inner.local_agent_ids.clear();
        drop(inner);
        tracing::info!("Cleared all state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydros_protocol::{AgentDefinition, AgentDriveMode};

    fn agent(id: &str, node: &str) -> AgentInstance {
        AgentInstance {
            definition: AgentDefinition::new("A", "TEST"),
            agent_id: id.into(),
            biz_scene_instance_id: "T1".into(),
            cluster_id: "c1".into(),
            node_id: node.into(),
            context: SimulationContext::new("T1"),
            biz_status: AgentBizStatus::Init,
            drive_mode: AgentDriveMode::SimTickDriven,
        }
    }

    #[test]
    fn test_node_fallback_only_without_id() {
        let state = StateManager::with_identity("c1", "node-1");
        // Same node but an unregistered ID: not local.
        assert!(!state.is_local_agent(&agent("AGT1_A", "node-1")));
        // No ID at all: node decides.
        assert!(state.is_local_agent(&agent("", "node-1")));
        assert!(!state.is_local_agent(&agent("", "node-2")));
    }

    #[test]
    fn test_no_node_identity_means_remote() {
        let state = StateManager::new();
        assert!(state.is_remote_agent(&agent("", "")));
    }

    #[test]
    fn test_terminate_marks_time_once() {
        let state = StateManager::new();
        let ctx = SimulationContext::new("T1");
        state.init_task(&ctx, &[]);
        state.terminate_task(&ctx);
        let first = state.get_task_state("T1").unwrap().terminated_at;
        state.terminate_task(&ctx);
        assert_eq!(state.get_task_state("T1").unwrap().terminated_at, first);
    }
}
