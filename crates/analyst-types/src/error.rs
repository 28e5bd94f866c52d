use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalystError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Validation(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Agent {agent} failed: {message}")]
    Agent { agent: String, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AnalystError {
    fn from(e: serde_json::Error) -> Self {
        AnalystError::Serialization(e.to_string())
    }
}
