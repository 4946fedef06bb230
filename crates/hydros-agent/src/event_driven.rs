use hydros_protocol::*;

use crate::agent::SimAgent;
use crate::base::AgentCore;
use crate::error::AgentError;

/// The model behind an event-driven agent.
pub trait ModelCalculation: Send + 'static {
    fn on_init(&mut self, _core: &AgentCore, _request: &TaskInitRequest) -> Result<(), AgentError> {
        Ok(())
    }

    fn calculate(&mut self, core: &AgentCore, event: &HydroEvent) -> Result<Vec<ObjectTimeSeries>, AgentError>;

    fn on_terminate(&mut self, _core: &AgentCore) -> Result<(), AgentError> {
        Ok(())
    }
}

/// EVENT_DRIVEN agent: not scheduled by ticks, computes on calculation
/// requests only.
pub struct EventDrivenAgent<C> {
    core: AgentCore,
    model: C,
}

impl<C: ModelCalculation> EventDrivenAgent<C> {
    pub fn new(core: AgentCore, model: C) -> Self {
        Self { core, model }
    }

    pub fn model(&self) -> &C {
        &self.model
    }
}

impl<C: ModelCalculation> SimAgent for EventDrivenAgent<C> {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_init(&mut self, request: &TaskInitRequest) -> Result<(), AgentError> {
        self.model.on_init(&self.core, request)
    }

    fn on_tick(&mut self, _request: &TickRequest) -> Result<(), AgentError> {
        Err(AgentError::unsupported_drive_mode(
            self.core.drive_mode(),
            CommandType::TickRequest.as_str(),
        ))
    }

    fn on_terminate(&mut self, _request: &TerminateRequest) -> Result<(), AgentError> {
        self.model.on_terminate(&self.core)
    }

    fn on_time_series_calculation(
        &mut self,
        request: &TimeSeriesCalculationRequest,
    ) -> Result<Vec<ObjectTimeSeries>, AgentError> {
        let output = self.model.calculate(&self.core, &request.hydro_event)?;
        tracing::info!(
            agent_id = %self.core.agent_id(),
            event_type = %request.hydro_event.hydro_event_type,
            series = output.len(),
            "Calculation complete"
        );
        Ok(output)
    }
}
