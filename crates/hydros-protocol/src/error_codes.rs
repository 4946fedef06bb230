use std::fmt;

/// A catalogued failure reported back in a response's `error_code` /
/// `error_message` pair.
///
/// Templates use positional `{0}`, `{1}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    pub code: &'static str,
    pub template: &'static str,
}

impl ErrorCode {
    pub const SYSTEM_ERROR: ErrorCode =
        ErrorCode::new("SYSTEM_ERROR", "Unknown system failure happens, cause: {0}-{1}");
    pub const INVALID_PARAMS: ErrorCode = ErrorCode::new("INVALID_PARAMS", "Invalid parameters: {0}");
    pub const CONFIGURATION_LOAD_FAILURE: ErrorCode =
        ErrorCode::new("CONFIGURATION_LOAD_FAILURE", "Configuration load failure: {0}, {1}");
    pub const DATA_SERIALIZATION_FAILURE: ErrorCode =
        ErrorCode::new("DATA_SERIALIZATION_FAILURE", "Data serialization failure: {0}, {1}");
    pub const AGENT_INIT_FAILURE: ErrorCode =
        ErrorCode::new("AGENT_INIT_FAILURE", "Agent initialization failed: {0}, detail: {1}");
    pub const AGENT_TICK_FAILURE: ErrorCode =
        ErrorCode::new("AGENT_TICK_FAILURE", "Agent tick execution failed: {0}, detail: {1}");
    pub const AGENT_TERMINATE_FAILURE: ErrorCode =
        ErrorCode::new("AGENT_TERMINATE_FAILURE", "Agent termination failed: {0}, detail: {1}");
    pub const TIME_SERIES_UPDATE_FAILURE: ErrorCode =
        ErrorCode::new("TIME_SERIES_UPDATE_FAILURE", "Time series data update failed: {0}, detail: {1}");
    pub const TIME_SERIES_CALCULATION_FAILURE: ErrorCode = ErrorCode::new(
        "TIME_SERIES_CALCULATION_FAILURE",
        "Time series calculation failed: {0}, detail: {1}",
    );
    pub const SIMULATION_EXECUTION_FAILURE: ErrorCode =
        ErrorCode::new("SIMULATION_EXECUTION_FAILURE", "Simulation execution failed: {0}, detail: {1}");
    pub const BOUNDARY_CONDITION_ERROR: ErrorCode =
        ErrorCode::new("BOUNDARY_CONDITION_ERROR", "Boundary condition error: {0}, detail: {1}");
    pub const CONTEXT_NOT_FOUND: ErrorCode =
        ErrorCode::new("CONTEXT_NOT_FOUND", "Simulation context not found: {0}");
    pub const AGENT_NOT_FOUND: ErrorCode = ErrorCode::new("AGENT_NOT_FOUND", "Agent instance not found: {0}");
    pub const UNSUPPORTED_DRIVE_MODE: ErrorCode =
        ErrorCode::new("UNSUPPORTED_DRIVE_MODE", "Command not supported in drive mode {0}: {1}");

    pub const fn new(code: &'static str, template: &'static str) -> Self {
        Self { code, template }
    }

    /// Fill `{n}` placeholders with the matching argument.
    /// Placeholders without an argument are left in place.
    pub fn format_message(&self, args: &[&dyn fmt::Display]) -> String {
        let mut message = self.template.to_string();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{i}}}"), &arg.to_string());
        }
        message
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let msg = ErrorCode::AGENT_INIT_FAILURE.format_message(&[&"AGT001_A", &"missing url"]);
        assert_eq!(msg, "Agent initialization failed: AGT001_A, detail: missing url");
    }

    #[test]
    fn test_format_message_missing_args() {
        let msg = ErrorCode::SYSTEM_ERROR.format_message(&[&"io"]);
        assert_eq!(msg, "Unknown system failure happens, cause: io-{1}");
    }

    #[test]
    fn test_display_is_code() {
        assert_eq!(ErrorCode::CONTEXT_NOT_FOUND.to_string(), "CONTEXT_NOT_FOUND");
    }
}
