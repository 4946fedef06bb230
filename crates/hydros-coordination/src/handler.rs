use hydros_protocol::*;
use hydros_state::StateManager;

use crate::error::HandlerResult;

/// Business logic invoked by the dispatcher, one method per accepted
/// command type.
///
/// Methods run synchronously on the transport's event-loop task and must
/// return promptly: replies go through an [`Outbox`](crate::Outbox), never
/// straight to the broker. Errors and panics are logged by the dispatcher;
/// turning a failure into a FAILED response is up to the handler.
pub trait CommandHandler: Send + Sync + 'static {
    fn on_task_init(&self, request: &TaskInitRequest) -> HandlerResult;

    fn on_tick(&self, request: &TickRequest) -> HandlerResult;

    fn on_terminate(&self, request: &TerminateRequest) -> HandlerResult;

    fn on_time_series_data_update(&self, request: &TimeSeriesDataUpdateRequest) -> HandlerResult {
        tracing::debug!(command_id = %request.header.command_id, "Time series update ignored");
        Ok(())
    }

    fn on_time_series_calculation(&self, request: &TimeSeriesCalculationRequest) -> HandlerResult {
        tracing::debug!(command_id = %request.header.command_id, "Time series calculation ignored");
        Ok(())
    }

    /// A remote process created agents for a task. Registers them by default.
    fn on_agent_instance_sibling_created(&self, state: &StateManager, response: &TaskInitResponse) -> HandlerResult {
        for sibling in &response.created_agent_instances {
            state.register_agent_instance(sibling);
        }
        if response.created_agent_instances.is_empty() {
            state.register_agent_instance(&response.outcome.source_agent_instance);
        }
        Ok(())
    }

    /// A remote agent reported its status. Refreshes its registration by default.
    fn on_agent_instance_sibling_status_updated(
        &self,
        state: &StateManager,
        report: &AgentInstanceStatusReport,
    ) -> HandlerResult {
        state.register_agent_instance(&report.outcome.source_agent_instance);
        Ok(())
    }

    fn on_parameter_identified(&self, report: &ParameterIdentifiedReport) -> HandlerResult {
        tracing::debug!(
            command_id = %report.header.command_id,
            parameters = report.identified_parameters.len(),
            "Identified parameters ignored"
        );
        Ok(())
    }

    fn on_alert(&self, report: &AlertReport) -> HandlerResult {
        tracing::debug!(alert_code = %report.alert_code, "Alert ignored");
        Ok(())
    }

    /// Responses from peers reach here only when the reception table is
    /// extended to accept them.
    fn on_peer_response(&self, response: &SimCommand) -> HandlerResult {
        tracing::debug!(command_type = %response.command_type(), "Peer response ignored");
        Ok(())
    }
}
