/// Prefix of every cluster coordination topic.
pub const TOPIC_PREFIX: &str = "/hydros/commands/coordination";

/// Prefix of generated agent instance IDs.
pub const AGENT_ID_PREFIX: &str = "AGT";

/// Prefix of generated command IDs.
pub const COMMAND_ID_PREFIX: &str = "SIMCMD";

/// Length of the `yyyyMMddHHmm` timestamp embedded in generated IDs.
pub const ID_TIMESTAMP_LEN: usize = 12;

/// Random suffix length of agent instance IDs.
pub const AGENT_ID_RANDOM_LEN: usize = 6;

/// Random suffix length of command IDs.
pub const COMMAND_ID_RANDOM_LEN: usize = 12;

// ── Command type discriminators ──

pub const SIMCMD_TASK_INIT_REQUEST: &str = "task_init_request";
pub const SIMCMD_TASK_INIT_RESPONSE: &str = "task_init_response";
pub const SIMCMD_TICK_CMD_REQUEST: &str = "tick_cmd_request";
pub const SIMCMD_TICK_CMD_RESPONSE: &str = "tick_cmd_response";
pub const SIMCMD_TASK_TERMINATED_REQUEST: &str = "SIMCMD_TASK_TERMINATED_REQUEST";
pub const SIMCMD_TASK_TERMINATED_RESPONSE: &str = "SIMCMD_TASK_TERMINATED_RESPONSE";
pub const SIMCMD_TIME_SERIES_DATA_UPDATE_REQUEST: &str = "SIMCMD_TIME_SERIES_DATA_UPDATE_REQUEST";
pub const SIMCMD_TIME_SERIES_DATA_UPDATE_RESPONSE: &str = "SIMCMD_TIME_SERIES_DATA_UPDATE_RESPONSE";
pub const SIMCMD_TIME_SERIES_CALCULATION_REQUEST: &str = "SIMCMD_TIME_SERIES_CALCULATION_REQUEST";
pub const SIMCMD_TIME_SERIES_CALCULATION_RESPONSE: &str = "SIMCMD_TIME_SERIES_CALCULATION_RESPONSE";
pub const SIMCMD_AGENT_INSTANCE_STATUS_REPORT: &str = "agent_instance_status_report";
pub const SIMCMD_PARAMETER_IDENTIFIED_REPORT: &str = "parameter_identified_report";
pub const SIMCMD_ALERT_REPORT: &str = "alert_report";

/// Event type carried by time-series data update requests.
pub const HYDRO_EVENT_TIME_SERIES_DATA_UPDATED: &str = "HYDRO_EVENT_TIME_SERIES_DATA_UPDATED";

/// Coordination topic shared by every agent process in a cluster.
pub fn coordination_topic(cluster_id: &str) -> String {
    format!("{TOPIC_PREFIX}/{cluster_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordination_topic() {
        assert_eq!(coordination_topic("weijiahao"), "/hydros/commands/coordination/weijiahao");
    }
}
