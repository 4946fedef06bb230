use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::HYDRO_EVENT_TIME_SERIES_DATA_UPDATED;

/// Business status of an agent instance, as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentBizStatus {
    #[default]
    Init,
    Idle,
    Active,
    Failed,
}

impl AgentBizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
        }
    }
}

/// Scheduling policy of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentDriveMode {
    /// Answers every tick with one simulation step.
    #[default]
    SimTickDriven,
    /// Ignores ticks; reacts to calculation-request events only.
    EventDriven,
    /// Field-deployed; receives no coordinator-driven commands.
    Proactive,
}

impl AgentDriveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimTickDriven => "SIM_TICK_DRIVEN",
            Self::EventDriven => "EVENT_DRIVEN",
            Self::Proactive => "PROACTIVE",
        }
    }
}

impl std::fmt::Display for AgentDriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome status carried by responses and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    #[default]
    Init,
    Processing,
    Succeed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub tenant_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BizScenario {
    pub biz_scenario_id: String,
    pub biz_scenario_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waterway {
    pub waterway_id: String,
    pub waterway_name: String,
}

/// Identity of one simulation task. Every command carries one and the
/// `biz_scene_instance_id` is the key all filtering is done against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationContext {
    pub biz_scene_instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Tenant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_scenario: Option<BizScenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waterway: Option<Waterway>,
    #[serde(default = "default_true")]
    pub valid: bool,
}

fn default_true() -> bool {
    true
}

impl SimulationContext {
    pub fn new(biz_scene_instance_id: impl Into<String>) -> Self {
        Self {
            biz_scene_instance_id: biz_scene_instance_id.into(),
            tenant: None,
            biz_scenario: None,
            waterway: None,
            valid: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.biz_scene_instance_id
    }
}

/// Static descriptor of an agent kind, as listed in a task-init request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub agent_code: String,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_configuration_url: String,
}

impl AgentDefinition {
    pub fn new(agent_code: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            agent_code: agent_code.into(),
            agent_type: agent_type.into(),
            agent_name: None,
            agent_configuration_url: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    pub fn with_configuration_url(mut self, url: impl Into<String>) -> Self {
        self.agent_configuration_url = url.into();
        self
    }
}

/// A running, uniquely identified participant in one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInstance {
    #[serde(flatten)]
    pub definition: AgentDefinition,
    #[serde(default)]
    pub agent_id: String,
    pub biz_scene_instance_id: String,
    #[serde(rename = "hydros_cluster_id", alias = "cluster_id", default)]
    pub cluster_id: String,
    #[serde(rename = "hydros_node_id", alias = "node_id", default)]
    pub node_id: String,
    pub context: SimulationContext,
    #[serde(rename = "agent_biz_status", alias = "biz_status", default)]
    pub biz_status: AgentBizStatus,
    #[serde(default)]
    pub drive_mode: AgentDriveMode,
}

impl AgentInstance {
    pub fn agent_code(&self) -> &str {
        &self.definition.agent_code
    }

    pub fn context_id(&self) -> &str {
        &self.biz_scene_instance_id
    }
}

/// Top-level hydro object managed by a task (reach, gate, station...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopHydroObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// One sample of a time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl TimeSeriesValue {
    pub fn at_step(step: i64, value: f64) -> Self {
        Self {
            step: Some(step),
            time: None,
            value: Some(value),
        }
    }
}

/// A metric series for one hydro object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectTimeSeries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_code: Option<String>,
    #[serde(default)]
    pub time_series: Vec<TimeSeriesValue>,
}

impl ObjectTimeSeries {
    pub fn new(object_id: i64, metrics_code: impl Into<String>, time_series: Vec<TimeSeriesValue>) -> Self {
        Self {
            object_id: Some(object_id),
            metrics_code: Some(metrics_code.into()),
            time_series,
            ..Default::default()
        }
    }

    /// Value recorded at `step`, if any.
    pub fn value_at(&self, step: i64) -> Option<f64> {
        self.time_series
            .iter()
            .find(|v| v.step == Some(step))
            .and_then(|v| v.value)
    }
}

/// A hydrological event that may trigger calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroEvent {
    pub hydro_event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydro_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydro_event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SimulationContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<serde_json::Value>,
    /// Step at which the event is auto-scheduled; -1 when unscheduled.
    #[serde(default = "default_schedule_step")]
    pub auto_schedule_at_step: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydro_event_source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydro_event_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydro_event_description: Option<String>,
}

fn default_schedule_step() -> i64 {
    -1
}

impl HydroEvent {
    pub fn new(hydro_event_type: impl Into<String>) -> Self {
        Self {
            hydro_event_type: hydro_event_type.into(),
            hydro_event_id: None,
            hydro_event_name: None,
            context: None,
            created_time: None,
            auto_schedule_at_step: default_schedule_step(),
            hydro_event_source_type: None,
            hydro_event_source: None,
            hydro_event_description: None,
        }
    }
}

/// Boundary data pushed to agents between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDataChangedEvent {
    #[serde(flatten)]
    pub event: HydroEvent,
    #[serde(default)]
    pub object_time_series: Vec<ObjectTimeSeries>,
}

impl TimeSeriesDataChangedEvent {
    pub fn new(object_time_series: Vec<ObjectTimeSeries>) -> Self {
        Self {
            event: HydroEvent::new(HYDRO_EVENT_TIME_SERIES_DATA_UPDATED),
            object_time_series,
        }
    }
}

/// A model parameter estimated by an identification agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    pub param_code: String,
    pub param_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&AgentDriveMode::SimTickDriven).unwrap(), "\"SIM_TICK_DRIVEN\"");
        assert_eq!(serde_json::to_string(&CommandStatus::Succeed).unwrap(), "\"SUCCEED\"");
        assert_eq!(serde_json::to_string(&AgentBizStatus::Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(AgentDriveMode::EventDriven.as_str(), "EVENT_DRIVEN");
    }

    #[test]
    fn test_context_valid_defaults_true() {
        let ctx: SimulationContext = serde_json::from_str(r#"{"biz_scene_instance_id":"T1"}"#).unwrap();
        assert!(ctx.valid);
        assert!(ctx.tenant.is_none());
        assert_eq!(ctx.id(), "T1");
    }

    #[test]
    fn test_agent_instance_wire_names() {
        let instance = AgentInstance {
            definition: AgentDefinition::new("A", "TWINS_SIMULATION_AGENT"),
            agent_id: "AGT202401011200ABC123_A".into(),
            biz_scene_instance_id: "T1".into(),
            cluster_id: "c1".into(),
            node_id: "n1".into(),
            context: SimulationContext::new("T1"),
            biz_status: AgentBizStatus::Active,
            drive_mode: AgentDriveMode::EventDriven,
        };
        let value = serde_json::to_value(&instance).unwrap();
        assert_eq!(value["hydros_cluster_id"], "c1");
        assert_eq!(value["hydros_node_id"], "n1");
        assert_eq!(value["agent_biz_status"], "ACTIVE");
        assert_eq!(value["agent_code"], "A");

        let back: AgentInstance = serde_json::from_value(value).unwrap();
        assert_eq!(back, instance);
    }

    #[test]
    fn test_agent_instance_accepts_short_names() {
        let json = r#"{
            "agent_code": "A",
            "agent_type": "T",
            "agent_configuration_url": "",
            "agent_id": "x",
            "biz_scene_instance_id": "T1",
            "cluster_id": "c9",
            "node_id": "n9",
            "context": {"biz_scene_instance_id": "T1"},
            "biz_status": "FAILED"
        }"#;
        let instance: AgentInstance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.cluster_id, "c9");
        assert_eq!(instance.node_id, "n9");
        assert_eq!(instance.biz_status, AgentBizStatus::Failed);
        assert_eq!(instance.drive_mode, AgentDriveMode::SimTickDriven);
    }

    #[test]
    fn test_series_value_at() {
        let series = ObjectTimeSeries::new(
            7,
            "water_level",
            vec![TimeSeriesValue::at_step(1, 10.5), TimeSeriesValue::at_step(2, 11.0)],
        );
        assert_eq!(series.value_at(2), Some(11.0));
        assert_eq!(series.value_at(3), None);
    }

    #[test]
    fn test_data_changed_event_type() {
        let event = TimeSeriesDataChangedEvent::new(vec![]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["hydro_event_type"], HYDRO_EVENT_TIME_SERIES_DATA_UPDATED);
        assert_eq!(value["auto_schedule_at_step"], -1);
    }
}
