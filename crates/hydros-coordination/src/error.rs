use std::path::PathBuf;
use std::time::Duration;

use hydros_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the coordination client and its outbound queue.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("no broker acknowledgement within {0:?}")]
    ConnectTimeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("publishing {command_id} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        command_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("{0} is not eligible for sending from this client")]
    NotSendable(String),

    #[error("client is already running")]
    AlreadyRunning,

    #[error("client is not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<rumqttc::ClientError> for CoordinationError {
    fn from(e: rumqttc::ClientError) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Error type returned by command handlers. Handlers own their failure
/// taxonomy; the dispatcher only logs it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;
