use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::identity::generate_command_id;
use crate::types::*;

/// Fields shared by every coordination command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHeader {
    pub command_id: String,
    pub context: SimulationContext,
    #[serde(default)]
    pub broadcast: bool,
}

impl CommandHeader {
    /// Fresh header with a generated command ID.
    pub fn new(context: SimulationContext) -> Self {
        Self {
            command_id: generate_command_id(),
            context,
            broadcast: false,
        }
    }

    /// Header for a reply: the request's command ID and context are kept so
    /// the coordinator can correlate the answer.
    pub fn reply_to(request: &CommandHeader) -> Self {
        Self {
            command_id: request.command_id.clone(),
            context: request.context.clone(),
            broadcast: false,
        }
    }
}

/// Outcome fields carried by responses and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default)]
    pub command_status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub source_agent_instance: AgentInstance,
}

impl Outcome {
    pub fn succeed(source: AgentInstance) -> Self {
        Self {
            command_status: CommandStatus::Succeed,
            error_code: None,
            error_message: None,
            source_agent_instance: source,
        }
    }

    pub fn failed(source: AgentInstance, error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            command_status: CommandStatus::Failed,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
            source_agent_instance: source,
        }
    }

    pub fn is_success(&self) -> bool {
        self.command_status == CommandStatus::Succeed
    }
}

// ── Task lifecycle ──

/// Activates a context and names the agent kinds that should join it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInitRequest {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(default)]
    pub agent_list: Vec<AgentDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_scene_configuration_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInitResponse {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default)]
    pub created_agent_instances: Vec<AgentInstance>,
    #[serde(default)]
    pub managed_top_objects: BTreeMap<String, Vec<TopHydroObject>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateRequest {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateResponse {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
}

// ── Simulation clock ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRequest {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(alias = "tick_id")]
    pub step: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResponse {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default)]
    pub step: i64,
}

// ── Time series ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDataUpdateRequest {
    #[serde(flatten)]
    pub header: CommandHeader,
    pub time_series_data_changed_event: TimeSeriesDataChangedEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDataUpdateResponse {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesCalculationRequest {
    #[serde(flatten)]
    pub header: CommandHeader,
    /// Agent expected to compute; every event-driven agent in the context
    /// answers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_instance: Option<AgentInstance>,
    pub hydro_event: HydroEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesCalculationResponse {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub hydro_event: HydroEvent,
    #[serde(default)]
    pub object_time_series_list: Vec<ObjectTimeSeries>,
}

// ── Reports ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInstanceStatusReport {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterIdentifiedReport {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default)]
    pub identified_parameters: Vec<IdentifiedParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    #[serde(flatten)]
    pub header: CommandHeader,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub alert_code: String,
    #[serde(default)]
    pub alert_level: AlertLevel,
    pub alert_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
}

/// Every message exchanged on a coordination topic, discriminated on the
/// wire by `command_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type")]
pub enum SimCommand {
    #[serde(rename = "task_init_request")]
    TaskInitRequest(TaskInitRequest),
    #[serde(rename = "task_init_response")]
    TaskInitResponse(TaskInitResponse),
    #[serde(rename = "tick_cmd_request")]
    TickRequest(TickRequest),
    #[serde(rename = "tick_cmd_response")]
    TickResponse(TickResponse),
    #[serde(rename = "SIMCMD_TASK_TERMINATED_REQUEST")]
    TerminateRequest(TerminateRequest),
    #[serde(rename = "SIMCMD_TASK_TERMINATED_RESPONSE")]
    TerminateResponse(TerminateResponse),
    #[serde(rename = "SIMCMD_TIME_SERIES_DATA_UPDATE_REQUEST")]
    TimeSeriesDataUpdateRequest(TimeSeriesDataUpdateRequest),
    #[serde(rename = "SIMCMD_TIME_SERIES_DATA_UPDATE_RESPONSE")]
    TimeSeriesDataUpdateResponse(TimeSeriesDataUpdateResponse),
    #[serde(rename = "SIMCMD_TIME_SERIES_CALCULATION_REQUEST")]
    TimeSeriesCalculationRequest(TimeSeriesCalculationRequest),
    #[serde(rename = "SIMCMD_TIME_SERIES_CALCULATION_RESPONSE")]
    TimeSeriesCalculationResponse(TimeSeriesCalculationResponse),
    #[serde(rename = "agent_instance_status_report")]
    AgentInstanceStatusReport(AgentInstanceStatusReport),
    #[serde(rename = "parameter_identified_report")]
    ParameterIdentifiedReport(ParameterIdentifiedReport),
    #[serde(rename = "alert_report")]
    AlertReport(AlertReport),
}

/// Whether a command asks, answers or informs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Request,
    Response,
    Report,
}

/// Enumeration of all command types for table lookups and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    TaskInitRequest,
    TaskInitResponse,
    TickRequest,
    TickResponse,
    TerminateRequest,
    TerminateResponse,
    TimeSeriesDataUpdateRequest,
    TimeSeriesDataUpdateResponse,
    TimeSeriesCalculationRequest,
    TimeSeriesCalculationResponse,
    AgentInstanceStatusReport,
    ParameterIdentifiedReport,
    AlertReport,
}

impl CommandType {
    pub const ALL: [CommandType; 13] = [
        Self::TaskInitRequest,
        Self::TaskInitResponse,
        Self::TickRequest,
        Self::TickResponse,
        Self::TerminateRequest,
        Self::TerminateResponse,
        Self::TimeSeriesDataUpdateRequest,
        Self::TimeSeriesDataUpdateResponse,
        Self::TimeSeriesCalculationRequest,
        Self::TimeSeriesCalculationResponse,
        Self::AgentInstanceStatusReport,
        Self::ParameterIdentifiedReport,
        Self::AlertReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskInitRequest => SIMCMD_TASK_INIT_REQUEST,
            Self::TaskInitResponse => SIMCMD_TASK_INIT_RESPONSE,
            Self::TickRequest => SIMCMD_TICK_CMD_REQUEST,
            Self::TickResponse => SIMCMD_TICK_CMD_RESPONSE,
            Self::TerminateRequest => SIMCMD_TASK_TERMINATED_REQUEST,
            Self::TerminateResponse => SIMCMD_TASK_TERMINATED_RESPONSE,
            Self::TimeSeriesDataUpdateRequest => SIMCMD_TIME_SERIES_DATA_UPDATE_REQUEST,
            Self::TimeSeriesDataUpdateResponse => SIMCMD_TIME_SERIES_DATA_UPDATE_RESPONSE,
            Self::TimeSeriesCalculationRequest => SIMCMD_TIME_SERIES_CALCULATION_REQUEST,
            Self::TimeSeriesCalculationResponse => SIMCMD_TIME_SERIES_CALCULATION_RESPONSE,
            Self::AgentInstanceStatusReport => SIMCMD_AGENT_INSTANCE_STATUS_REPORT,
            Self::ParameterIdentifiedReport => SIMCMD_PARAMETER_IDENTIFIED_REPORT,
            Self::AlertReport => SIMCMD_ALERT_REPORT,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::TaskInitRequest
            | Self::TickRequest
            | Self::TerminateRequest
            | Self::TimeSeriesDataUpdateRequest
            | Self::TimeSeriesCalculationRequest => CommandKind::Request,
            Self::TaskInitResponse
            | Self::TickResponse
            | Self::TerminateResponse
            | Self::TimeSeriesDataUpdateResponse
            | Self::TimeSeriesCalculationResponse => CommandKind::Response,
            Self::AgentInstanceStatusReport | Self::ParameterIdentifiedReport | Self::AlertReport => {
                CommandKind::Report
            }
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SimCommand {
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::TaskInitRequest(_) => CommandType::TaskInitRequest,
            Self::TaskInitResponse(_) => CommandType::TaskInitResponse,
            Self::TickRequest(_) => CommandType::TickRequest,
            Self::TickResponse(_) => CommandType::TickResponse,
            Self::TerminateRequest(_) => CommandType::TerminateRequest,
            Self::TerminateResponse(_) => CommandType::TerminateResponse,
            Self::TimeSeriesDataUpdateRequest(_) => CommandType::TimeSeriesDataUpdateRequest,
            Self::TimeSeriesDataUpdateResponse(_) => CommandType::TimeSeriesDataUpdateResponse,
            Self::TimeSeriesCalculationRequest(_) => CommandType::TimeSeriesCalculationRequest,
            Self::TimeSeriesCalculationResponse(_) => CommandType::TimeSeriesCalculationResponse,
            Self::AgentInstanceStatusReport(_) => CommandType::AgentInstanceStatusReport,
            Self::ParameterIdentifiedReport(_) => CommandType::ParameterIdentifiedReport,
            Self::AlertReport(_) => CommandType::AlertReport,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.command_type().kind()
    }

    pub fn is_request(&self) -> bool {
        self.kind() == CommandKind::Request
    }

    pub fn header(&self) -> &CommandHeader {
        match self {
            Self::TaskInitRequest(c) => &c.header,
            Self::TaskInitResponse(c) => &c.header,
            Self::TickRequest(c) => &c.header,
            Self::TickResponse(c) => &c.header,
            Self::TerminateRequest(c) => &c.header,
            Self::TerminateResponse(c) => &c.header,
            Self::TimeSeriesDataUpdateRequest(c) => &c.header,
            Self::TimeSeriesDataUpdateResponse(c) => &c.header,
            Self::TimeSeriesCalculationRequest(c) => &c.header,
            Self::TimeSeriesCalculationResponse(c) => &c.header,
            Self::AgentInstanceStatusReport(c) => &c.header,
            Self::ParameterIdentifiedReport(c) => &c.header,
            Self::AlertReport(c) => &c.header,
        }
    }

    /// Outcome block of a response or report; `None` for requests.
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::TaskInitResponse(c) => Some(&c.outcome),
            Self::TickResponse(c) => Some(&c.outcome),
            Self::TerminateResponse(c) => Some(&c.outcome),
            Self::TimeSeriesDataUpdateResponse(c) => Some(&c.outcome),
            Self::TimeSeriesCalculationResponse(c) => Some(&c.outcome),
            Self::AgentInstanceStatusReport(c) => Some(&c.outcome),
            Self::ParameterIdentifiedReport(c) => Some(&c.outcome),
            Self::AlertReport(c) => Some(&c.outcome),
            Self::TaskInitRequest(_)
            | Self::TickRequest(_)
            | Self::TerminateRequest(_)
            | Self::TimeSeriesDataUpdateRequest(_)
            | Self::TimeSeriesCalculationRequest(_) => None,
        }
    }

    pub fn source_agent_instance(&self) -> Option<&AgentInstance> {
        self.outcome().map(|o| &o.source_agent_instance)
    }

    pub fn command_id(&self) -> &str {
        &self.header().command_id
    }

    pub fn context(&self) -> &SimulationContext {
        &self.header().context
    }

    pub fn context_id(&self) -> &str {
        &self.header().context.biz_scene_instance_id
    }

    /// Serialize to the wire JSON form.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse one wire payload. The discriminator is checked first so an
    /// unknown type is reported as such rather than as a schema error.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(payload)?;
        let value: serde_json::Value = serde_json::from_str(text)?;
        let tag = value
            .get("command_type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingCommandType)?;
        let command_type =
            CommandType::from_str(tag).ok_or_else(|| ProtocolError::UnknownCommandType(tag.to_string()))?;
        serde_json::from_value(value).map_err(|source| ProtocolError::Schema {
            kind: command_type.as_str(),
            source,
        })
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for SimCommand {
                fn from(cmd: $variant) -> Self {
                    SimCommand::$variant(cmd)
                }
            }
        )*
    };
}

impl_from_variant!(
    TaskInitRequest,
    TaskInitResponse,
    TickRequest,
    TickResponse,
    TerminateRequest,
    TerminateResponse,
    TimeSeriesDataUpdateRequest,
    TimeSeriesDataUpdateResponse,
    TimeSeriesCalculationRequest,
    TimeSeriesCalculationResponse,
    AgentInstanceStatusReport,
    ParameterIdentifiedReport,
    AlertReport,
);
