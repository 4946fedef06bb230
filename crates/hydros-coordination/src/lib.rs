//! Hydros Coordination - one shared MQTT topic per cluster, made to behave
//! like a private, reliable command/response channel for each local agent.
//!
//! Inbound: bytes are decoded into a [`SimCommand`](hydros_protocol::SimCommand),
//! checked by the [`MessageFilter`] and dispatched to a [`CommandHandler`].
//! Outbound: handlers enqueue replies on an [`Outbox`]; a single worker
//! re-checks eligibility and publishes with bounded exponential backoff.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod handler;
pub mod outbound;
pub mod transport;

pub use client::{ConnectionState, CoordinationClient, Dispatcher};
pub use config::{ClientConfig, Qos};
pub use error::{CoordinationError, HandlerError, HandlerResult};
pub use filter::{MessageFilter, Reception};
pub use handler::CommandHandler;
pub use outbound::{send_with_retry, should_send, Outbound, Outbox, RetryPolicy};
pub use transport::{MqttLink, Publisher};
