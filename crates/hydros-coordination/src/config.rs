use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hydros_protocol::coordination_topic;

use crate::error::CoordinationError;
use crate::outbound::RetryPolicy;

/// MQTT delivery quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Coordination client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Broker host, optionally prefixed with `tcp://`.
    pub broker_url: String,

    #[serde(default = "default_port")]
    pub broker_port: u16,

    /// Cluster this process belongs to; selects the default topic.
    #[serde(default)]
    pub cluster_id: String,

    /// Node this process runs on; used for local-agent fallback checks.
    #[serde(default)]
    pub node_id: String,

    /// Explicit topic. Defaults to the cluster coordination topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Component name embedded in generated client IDs.
    #[serde(default = "default_component")]
    pub component: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub qos: Qos,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_ms: u64,

    #[serde(default = "default_queue_poll_interval")]
    pub queue_poll_interval_ms: u64,

    #[serde(default = "default_stop_join_timeout")]
    pub stop_join_timeout_secs: u64,

    /// Pause between reconnect attempts after a transport error.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_component() -> String {
    "agent".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retry_count() -> u32 {
    5
}

fn default_base_retry_delay() -> u64 {
    1000
}

fn default_queue_poll_interval() -> u64 {
    1000
}

fn default_stop_join_timeout() -> u64 {
    5
}

fn default_reconnect_delay() -> u64 {
    5000
}

impl ClientConfig {
    pub fn new(broker_url: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            broker_port: default_port(),
            cluster_id: cluster_id.into(),
            node_id: String::new(),
            topic: None,
            client_id: None,
            component: default_component(),
            username: None,
            password: None,
            qos: Qos::default(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            max_retry_count: default_max_retry_count(),
            base_retry_delay_ms: default_base_retry_delay(),
            queue_poll_interval_ms: default_queue_poll_interval(),
            stop_join_timeout_secs: default_stop_join_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.broker_port = port;
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_retry(mut self, max_retry_count: u32, base_retry_delay_ms: u64) -> Self {
        self.max_retry_count = max_retry_count;
        self.base_retry_delay_ms = base_retry_delay_ms;
        self
    }

    pub fn with_queue_poll_interval_ms(mut self, ms: u64) -> Self {
        self.queue_poll_interval_ms = ms;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, CoordinationError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoordinationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CoordinationError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), CoordinationError> {
        let mut errors = Vec::new();
        if self.broker_host().is_empty() {
            errors.push("broker_url must not be empty");
        }
        if self.topic().is_empty() {
            errors.push("either topic or cluster_id must be set");
        }
        if self.queue_poll_interval_ms == 0 {
            errors.push("queue_poll_interval_ms must be greater than 0");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoordinationError::Config(errors.join("; ")))
        }
    }

    /// Broker host with any `tcp://` scheme removed.
    pub fn broker_host(&self) -> &str {
        let url = self.broker_url.trim();
        url.strip_prefix("tcp://").unwrap_or(url)
    }

    /// The single topic this client subscribes and publishes to.
    pub fn topic(&self) -> String {
        match &self.topic {
            Some(topic) if !topic.is_empty() => topic.clone(),
            _ if self.cluster_id.is_empty() => String::new(),
            _ => coordination_topic(&self.cluster_id),
        }
    }

    /// Configured client ID, or `hydros_<component>_<millis>`.
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("hydros_{}_{}", self.component, chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry_count: self.max_retry_count,
            base_delay: Duration::from_millis(self.base_retry_delay_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_join_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_host_strips_scheme() {
        let config = ClientConfig::new("tcp://192.168.1.24", "c1");
        assert_eq!(config.broker_host(), "192.168.1.24");
        let config = ClientConfig::new("broker.local", "c1");
        assert_eq!(config.broker_host(), "broker.local");
    }

    #[test]
    fn test_default_topic() {
        let config = ClientConfig::new("localhost", "weijiahao");
        assert_eq!(config.topic(), "/hydros/commands/coordination/weijiahao");
        let config = config.with_topic("/custom/topic");
        assert_eq!(config.topic(), "/custom/topic");
    }

    #[test]
    fn test_generated_client_id() {
        let config = ClientConfig::new("localhost", "c1");
        assert!(config.client_id().starts_with("hydros_agent_"));
        let config = config.with_client_id("fixed");
        assert_eq!(config.client_id(), "fixed");
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(rumqttc::QoS::from(Qos::default()), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(Qos::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }
}
