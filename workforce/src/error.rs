//! Workforce error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkforceError {
    #[error("task decomposition failed: {0}")]
    Decomposition(String),

    #[error("no workers registered")]
    NoWorkers,

    #[error("task '{task_id}' timed out after {seconds}s")]
    TaskTimeout { task_id: String, seconds: u64 },

    #[error("log dump failed: {0}")]
    LogDump(String),

    #[error(transparent)]
    Agent(#[from] agent::AgentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkforceError>;
