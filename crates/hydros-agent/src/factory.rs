use std::sync::Arc;

use hydros_coordination::Outbox;
use hydros_protocol::{AgentDefinition, AgentDriveMode, SimulationContext};
use hydros_state::StateManager;

use crate::agent::SimAgent;
use crate::base::AgentCore;
use crate::error::AgentError;
use crate::event_driven::{EventDrivenAgent, ModelCalculation};
use crate::tickable::{TickStep, TickableAgent};

/// Creates agents of one kind, once per task that lists its agent code.
pub trait AgentFactory: Send + Sync {
    fn agent_code(&self) -> &str;

    fn create(
        &self,
        definition: &AgentDefinition,
        context: &SimulationContext,
        state: Arc<StateManager>,
        outbox: Outbox,
    ) -> Result<Box<dyn SimAgent>, AgentError>;
}

type BuildFn = dyn Fn(AgentCore) -> Result<Box<dyn SimAgent>, AgentError> + Send + Sync;

/// Factory from a closure over a prepared [`AgentCore`].
pub struct SimpleFactory {
    agent_code: String,
    drive_mode: AgentDriveMode,
    build: Box<BuildFn>,
}

impl SimpleFactory {
    pub fn new<F>(agent_code: impl Into<String>, drive_mode: AgentDriveMode, build: F) -> Self
    where
        F: Fn(AgentCore) -> Result<Box<dyn SimAgent>, AgentError> + Send + Sync + 'static,
    {
        Self {
            agent_code: agent_code.into(),
            drive_mode,
            build: Box::new(build),
        }
    }

    /// Factory for a [`TickableAgent`] around a fresh model per task.
    pub fn tickable<S, M>(agent_code: impl Into<String>, make_model: M) -> Self
    where
        S: TickStep,
        M: Fn() -> S + Send + Sync + 'static,
    {
        Self::new(agent_code, AgentDriveMode::SimTickDriven, move |core| {
            Ok(Box::new(TickableAgent::new(core, make_model())))
        })
    }

    /// Factory for an [`EventDrivenAgent`] around a fresh model per task.
    pub fn event_driven<C, M>(agent_code: impl Into<String>, make_model: M) -> Self
    where
        C: ModelCalculation,
        M: Fn() -> C + Send + Sync + 'static,
    {
        Self::new(agent_code, AgentDriveMode::EventDriven, move |core| {
            Ok(Box::new(EventDrivenAgent::new(core, make_model())))
        })
    }

    pub fn drive_mode(&self) -> AgentDriveMode {
        self.drive_mode
    }
}

impl AgentFactory for SimpleFactory {
    fn agent_code(&self) -> &str {
        &self.agent_code
    }

    fn create(
        &self,
        definition: &AgentDefinition,
        context: &SimulationContext,
        state: Arc<StateManager>,
        outbox: Outbox,
    ) -> Result<Box<dyn SimAgent>, AgentError> {
        let core = AgentCore::new(definition.clone(), self.drive_mode, context, state, outbox);
        (self.build)(core)
    }
}
