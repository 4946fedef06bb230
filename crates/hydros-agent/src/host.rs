use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use hydros_coordination::{CommandHandler, HandlerResult, Outbox};
use hydros_protocol::*;
use hydros_state::StateManager;

use crate::agent::SimAgent;
use crate::base::LifecycleState;
use crate::error::AgentError;
use crate::factory::AgentFactory;
use crate::lifecycle;

/// Hosts every local agent of this process and routes the coordinator's
/// commands to them by context.
///
/// A task-init request creates one agent per listed `agent_code` that has a
/// registered factory. Codes without a factory belong to other processes
/// and are skipped.
pub struct AgentHost {
    state: Arc<StateManager>,
    outbox: Outbox,
    factories: HashMap<String, Arc<dyn AgentFactory>>,
    agents: Mutex<HashMap<String, Vec<Box<dyn SimAgent>>>>,
}

impl AgentHost {
    pub fn new(outbox: Outbox, state: Arc<StateManager>) -> Self {
        Self {
            state,
            outbox,
            factories: HashMap::new(),
            agents: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_factory(mut self, factory: impl AgentFactory + 'static) -> Self {
        self.register_factory(factory);
        self
    }

    /// Register a factory, replacing any previous one for the same code.
    pub fn register_factory(&mut self, factory: impl AgentFactory + 'static) {
        let code = factory.agent_code().to_string();
        if self.factories.insert(code.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(agent_code = %code, "Replaced agent factory");
        }
    }

    pub fn factory_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.factories.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn contexts(&self) -> Vec<String> {
        self.agents.lock().keys().cloned().collect()
    }

    pub fn agent_count(&self, context_id: &str) -> usize {
        self.agents.lock().get(context_id).map_or(0, Vec::len)
    }

    pub fn agent_ids(&self, context_id: &str) -> Vec<String> {
        self.agents
            .lock()
            .get(context_id)
            .map(|agents| agents.iter().map(|a| a.core().agent_id().to_string()).collect())
            .unwrap_or_default()
    }

    /// Lifecycle of a hosted agent, if this host holds it.
    pub fn lifecycle_of(&self, agent_id: &str) -> Option<LifecycleState> {
        self.agents
            .lock()
            .values()
            .flatten()
            .find(|a| a.core().agent_id() == agent_id)
            .map(|a| a.core().lifecycle())
    }

    /// Run `f` over the agents hosted for `context_id`.
    fn for_each_agent(&self, context_id: &str, mut f: impl FnMut(&mut dyn SimAgent)) {
        let mut agents = self.agents.lock();
        let Some(hosted) = agents.get_mut(context_id) else {
            tracing::debug!(context_id = %context_id, "No local agents for context");
            return;
        };
        for agent in hosted.iter_mut() {
            f(agent.as_mut());
        }
    }

    fn create_agents(&self, request: &TaskInitRequest) -> (Vec<Box<dyn SimAgent>>, Option<AgentError>) {
        let context = &request.header.context;
        let mut created = Vec::new();
        let mut first_error = None;

        for definition in &request.agent_list {
            let Some(factory) = self.factories.get(&definition.agent_code) else {
                tracing::debug!(agent_code = %definition.agent_code, "No local factory for agent code");
                continue;
            };
            let mut agent = match factory.create(definition, context, self.state.clone(), self.outbox.clone()) {
                Ok(agent) => agent,
                Err(e) => {
                    tracing::error!(
                        agent_code = %definition.agent_code,
                        error = %e,
                        "Failed to create agent"
                    );
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            if let Err(e) = lifecycle::run_init(agent.as_mut(), request) {
                first_error.get_or_insert(e);
            }
            created.push(agent);
        }

        (created, first_error)
    }
}

impl CommandHandler for AgentHost {
    fn on_task_init(&self, request: &TaskInitRequest) -> HandlerResult {
        let context = &request.header.context;
        let context_id = context.id().to_string();
        if self.agents.lock().contains_key(&context_id) {
            tracing::info!(context_id = %context_id, "Task already initialized here");
            return Ok(());
        }

        let (created, first_error) = self.create_agents(request);
        let Some(source) = created.first().map(|a| a.core().instance().clone()) else {
            match first_error {
                Some(e) => tracing::error!(context_id = %context_id, error = %e, "No agent created for task"),
                None => tracing::debug!(context_id = %context_id, "Task lists no locally hosted agent"),
            }
            return Ok(());
        };

        let (live, mut failed): (Vec<_>, Vec<_>) = created
            .into_iter()
            .partition(|a| a.core().lifecycle() == LifecycleState::Active);

        let instances: Vec<AgentInstance> = live.iter().map(|a| a.core().instance().clone()).collect();
        if !live.is_empty() {
            self.state.init_task(context, &instances);
        }

        let source = live.first().map(|a| a.core().instance().clone()).unwrap_or(source);
        let outcome = match &first_error {
            None => Outcome::succeed(source),
            Some(e) => Outcome::failed(source, e.error_code(), e.message.clone()),
        };
        let managed_top_objects: BTreeMap<String, Vec<TopHydroObject>> = live
            .iter()
            .map(|a| (a.core().agent_id().to_string(), a.managed_top_objects()))
            .filter(|(_, objects)| !objects.is_empty())
            .collect();

        tracing::info!(
            context_id = %context_id,
            created = instances.len(),
            failed = failed.len(),
            "Task init handled"
        );
        self.outbox.enqueue(TaskInitResponse {
            header: CommandHeader::reply_to(&request.header),
            outcome,
            created_agent_instances: instances,
            managed_top_objects,
        });

        for agent in failed.iter_mut() {
            agent.core_mut().retire();
        }
        if !live.is_empty() {
            self.agents.lock().insert(context_id, live);
        }
        Ok(())
    }

    fn on_tick(&self, request: &TickRequest) -> HandlerResult {
        self.for_each_agent(request.header.context.id(), |agent| {
            if agent.core().drive_mode() != AgentDriveMode::Proactive {
                lifecycle::run_tick(agent, request);
            }
        });
        Ok(())
    }

    fn on_time_series_data_update(&self, request: &TimeSeriesDataUpdateRequest) -> HandlerResult {
        self.for_each_agent(request.header.context.id(), |agent| {
            if agent.core().drive_mode() != AgentDriveMode::Proactive {
                lifecycle::run_data_update(agent, request);
            }
        });
        Ok(())
    }

    fn on_time_series_calculation(&self, request: &TimeSeriesCalculationRequest) -> HandlerResult {
        let target = request
            .target_agent_instance
            .as_ref()
            .map(|t| t.agent_id.as_str())
            .filter(|id| !id.is_empty());
        self.for_each_agent(request.header.context.id(), |agent| {
            if agent.core().drive_mode() != AgentDriveMode::EventDriven {
                return;
            }
            if target.is_some_and(|id| id != agent.core().agent_id()) {
                return;
            }
            lifecycle::run_calculation(agent, request);
        });
        Ok(())
    }

    fn on_terminate(&self, request: &TerminateRequest) -> HandlerResult {
        let context = &request.header.context;
        let hosted = self.agents.lock().remove(context.id());
        match hosted {
            Some(mut agents) => {
                for agent in agents.iter_mut() {
                    lifecycle::run_terminate(agent.as_mut(), request);
                }
            }
            None => tracing::debug!(context_id = %context.id(), "No local agents to terminate"),
        }
        self.state.terminate_task(context);
        Ok(())
    }
}

impl std::fmt::Debug for AgentHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHost")
            .field("factories", &self.factory_codes())
            .field("contexts", &self.contexts())
            .finish()
    }
}
