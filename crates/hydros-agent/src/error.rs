use std::fmt::Display;

use hydros_protocol::{AgentDriveMode, ErrorCode};
use thiserror::Error;

/// Failure of an agent lifecycle callback, carried back to the coordinator
/// as the `error_code` / `error_message` of a FAILED response.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AgentError {
    pub code: ErrorCode,
    pub message: String,
}

impl AgentError {
    /// Build from a catalogued code, filling its template with `args`.
    pub fn new(code: ErrorCode, args: &[&dyn Display]) -> Self {
        Self {
            message: code.format_message(args),
            code,
        }
    }

    pub fn init_failure(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::AGENT_INIT_FAILURE, &[&agent_id, &detail])
    }

    pub fn tick_failure(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::AGENT_TICK_FAILURE, &[&agent_id, &detail])
    }

    pub fn terminate_failure(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::AGENT_TERMINATE_FAILURE, &[&agent_id, &detail])
    }

    pub fn time_series_update_failure(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::TIME_SERIES_UPDATE_FAILURE, &[&agent_id, &detail])
    }

    pub fn calculation_failure(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::TIME_SERIES_CALCULATION_FAILURE, &[&agent_id, &detail])
    }

    pub fn boundary_condition(agent_id: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::BOUNDARY_CONDITION_ERROR, &[&agent_id, &detail])
    }

    pub fn configuration(url: &str, detail: impl Display) -> Self {
        Self::new(ErrorCode::CONFIGURATION_LOAD_FAILURE, &[&url, &detail])
    }

    pub fn unsupported_drive_mode(mode: AgentDriveMode, command: &str) -> Self {
        Self::new(ErrorCode::UNSUPPORTED_DRIVE_MODE, &[&mode, &command])
    }

    pub fn error_code(&self) -> &'static str {
        self.code.code
    }
}
