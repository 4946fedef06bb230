use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::ClientConfig;
use crate::error::CoordinationError;

/// Outbound side of the transport. The queue worker only ever publishes
/// through this seam.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoordinationError>;

    async fn disconnect(&self) -> Result<(), CoordinationError> {
        Ok(())
    }
}

/// Request capacity of the rumqttc client channel.
const REQUEST_CAPACITY: usize = 64;

/// rumqttc-backed publisher. A fresh client/event-loop pair is installed on
/// every connect so a stopped client can be started again.
///
/// Publishing never waits on the request channel: while the broker is not
/// acknowledged, or the channel is full, `publish` fails at once so the
/// caller's retry policy applies.
pub struct MqttLink {
    client: RwLock<Option<AsyncClient>>,
    qos: QoS,
    connected: AtomicBool,
}

impl MqttLink {
    pub fn new(qos: QoS) -> Self {
        Self {
            client: RwLock::new(None),
            qos,
            connected: AtomicBool::new(false),
        }
    }

    /// Set by the event-loop driver on broker acknowledgement and cleared
    /// on disconnect or connection error.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn options(config: &ClientConfig) -> MqttOptions {
        let mut options = MqttOptions::new(config.client_id(), config.broker_host(), config.broker_port);
        options.set_keep_alive(config.keep_alive());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        options
    }

    /// Create a new client/event-loop pair and install the client. The
    /// returned event loop must be polled for anything to reach the broker.
    pub fn connect(&self, config: &ClientConfig) -> EventLoop {
        let (client, event_loop) = AsyncClient::new(Self::options(config), REQUEST_CAPACITY);
        *self.client.write() = Some(client);
        self.set_connected(false);
        event_loop
    }

    /// Queue a subscription without awaiting channel capacity; safe to call
    /// from the task that polls the event loop.
    pub fn try_subscribe(&self, topic: &str) -> Result<(), CoordinationError> {
        let client = self.current()?;
        client.try_subscribe(topic, self.qos)?;
        Ok(())
    }

    fn current(&self) -> Result<AsyncClient, CoordinationError> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| CoordinationError::Transport("MQTT client not connected".into()))
    }
}

#[async_trait]
impl Publisher for MqttLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoordinationError> {
        if !self.is_connected() {
            return Err(CoordinationError::Transport("broker not connected".into()));
        }
        let client = self.current()?;
        client.try_publish(topic, self.qos, false, payload)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoordinationError> {
        self.set_connected(false);
        let client = self.current()?;
        client.try_disconnect()?;
        Ok(())
    }
}
