//! Error types for asyncjobs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested work exceeds the configured execution timeout.
    #[error("{seconds} major then {timeout}")]
    TimeoutExceeded { seconds: u64, timeout: u64 },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable name of the error kind, reported in failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "InvalidInput",
            Error::TimeoutExceeded { .. } => "TimeoutExceeded",
            Error::ExecutionFailed(_) => "ExecutionFailed",
            Error::Timeout(_) => "Timeout",
            Error::Storage(_) => "Storage",
            Error::Internal(_) => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
