use thiserror::Error;

/// Failures while turning wire bytes into commands and back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no command_type discriminator")]
    MissingCommandType,

    #[error("unknown command_type '{0}'")]
    UnknownCommandType(String),

    #[error("invalid {kind} payload: {source}")]
    Schema {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
