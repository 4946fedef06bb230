//! Drives a [`SimAgent`] through its lifecycle: runs the callback, moves
//! the lifecycle state and queues the reply sourced from the agent.

use hydros_protocol::*;

use crate::agent::SimAgent;
use crate::error::AgentError;

/// Enlist the agent, resolve its definition and run `on_init`.
/// The task-init reply is aggregated by the caller.
pub fn run_init(agent: &mut dyn SimAgent, request: &TaskInitRequest) -> Result<(), AgentError> {
    let definition = agent.core().resolve_definition(request).cloned();
    match definition {
        Some(definition) => agent.core_mut().adopt_definition(&definition),
        None => tracing::warn!(
            agent_code = %agent.core().agent_code(),
            "Agent code not listed in task init request"
        ),
    }
    agent.core_mut().enlist();

    let result = agent.on_init(request);
    match &result {
        Ok(()) => agent.core_mut().activate(),
        Err(e) => agent.core_mut().mark_failed(e),
    }
    result
}

/// Answer a tick. Only tick-driven agents step; event-driven agents reply
/// FAILED since they are not scheduled by the clock.
pub fn run_tick(agent: &mut dyn SimAgent, request: &TickRequest) {
    if !agent.core().is_live() {
        return;
    }
    let result = match agent.core().drive_mode() {
        AgentDriveMode::SimTickDriven => {
            let result = agent.on_tick(request);
            if let Err(e) = &result {
                agent.core_mut().mark_failed(e);
            }
            result
        }
        mode => Err(AgentError::unsupported_drive_mode(mode, CommandType::TickRequest.as_str())),
    };

    tracing::debug!(
        agent_id = %agent.core().agent_id(),
        step = request.step,
        ok = result.is_ok(),
        "Tick handled"
    );

    let core = agent.core();
    core.send(TickResponse {
        header: CommandHeader::reply_to(&request.header),
        outcome: core.outcome(&result),
        step: request.step,
    });
}

pub fn run_data_update(agent: &mut dyn SimAgent, request: &TimeSeriesDataUpdateRequest) {
    if !agent.core().is_live() {
        return;
    }
    let result = agent.on_time_series_data_update(request);
    if let Err(e) = &result {
        agent.core_mut().mark_failed(e);
    }
    let core = agent.core();
    core.send(TimeSeriesDataUpdateResponse {
        header: CommandHeader::reply_to(&request.header),
        outcome: core.outcome(&result),
    });
}

/// Answer a calculation request with the computed series, or FAILED with
/// an empty list.
pub fn run_calculation(agent: &mut dyn SimAgent, request: &TimeSeriesCalculationRequest) {
    if !agent.core().is_live() {
        return;
    }
    let result = agent.on_time_series_calculation(request);
    if let Err(e) = &result {
        agent.core_mut().mark_failed(e);
    }
    let core = agent.core();
    let outcome = core.outcome(&result);
    core.send(TimeSeriesCalculationResponse {
        header: CommandHeader::reply_to(&request.header),
        outcome,
        hydro_event: request.hydro_event.clone(),
        object_time_series_list: result.unwrap_or_default(),
    });
}

/// Run `on_terminate`, reply, then retire the agent. The agent is retired
/// even when the callback fails.
pub fn run_terminate(agent: &mut dyn SimAgent, request: &TerminateRequest) {
    let result = agent.on_terminate(request);
    if let Err(e) = &result {
        tracing::warn!(
            agent_id = %agent.core().agent_id(),
            error = %e,
            "Agent termination failed"
        );
    }
    let core = agent.core();
    core.send(TerminateResponse {
        header: CommandHeader::reply_to(&request.header),
        outcome: core.outcome(&result),
    });
    agent.core_mut().retire();
}
