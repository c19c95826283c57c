//! Library error types

use thiserror::Error;

/// Errors produced by agents, model backends, and toolkits
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model error: {0}")]
    Model(String),

    #[error("model API error {status}: {body}")]
    ModelApi { status: u16, body: String },

    #[error("invalid base url '{0}'")]
    InvalidUrl(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },

    #[error("invalid tool arguments for '{name}': {message}")]
    InvalidArguments { name: String, message: String },

    #[error("browser bridge error: {0}")]
    Bridge(String),

    #[error("browser bridge startup timed out after {0:?}")]
    BridgeStartupTimeout(std::time::Duration),

    #[error("browser action '{action}' timed out after {timeout:?}")]
    BridgeActionTimeout {
        action: String,
        timeout: std::time::Duration,
    },

    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
