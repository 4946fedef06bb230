use hydros_protocol::*;

use crate::base::AgentCore;
use crate::error::AgentError;

/// One stateful participant in a simulation task.
///
/// Implementors supply the callbacks; [`lifecycle`](crate::lifecycle)
/// drives them, moves the lifecycle state and sends the replies.
pub trait SimAgent: Send {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// Prepare for the task (load configuration, build models).
    fn on_init(&mut self, request: &TaskInitRequest) -> Result<(), AgentError>;

    /// Advance one simulation step.
    fn on_tick(&mut self, request: &TickRequest) -> Result<(), AgentError>;

    fn on_terminate(&mut self, request: &TerminateRequest) -> Result<(), AgentError>;

    fn on_time_series_data_update(&mut self, _request: &TimeSeriesDataUpdateRequest) -> Result<(), AgentError> {
        Ok(())
    }

    /// Compute series for a hydro event. Only event-driven agents answer.
    fn on_time_series_calculation(
        &mut self,
        request: &TimeSeriesCalculationRequest,
    ) -> Result<Vec<ObjectTimeSeries>, AgentError> {
        Err(AgentError::unsupported_drive_mode(
            self.core().drive_mode(),
            request.hydro_event.hydro_event_type.as_str(),
        ))
    }

    /// Hydro objects this agent manages, reported in the task-init response.
    fn managed_top_objects(&self) -> Vec<TopHydroObject> {
        Vec::new()
    }
}
