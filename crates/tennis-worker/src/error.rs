//! Worker error types.

use std::time::Duration;
use thiserror::Error;

use tennis_vision::{DecodeError, VisionError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid match metadata: {0}")]
    InvalidMetadata(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Vision error: {0}")]
    Vision(VisionError),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Worker is shutting down")]
    ShuttingDown,

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job panicked: {0}")]
    JobPanicked(String),

    #[error("Pipeline stage failed: {0}")]
    StageFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<VisionError> for WorkerError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Decode(e) => WorkerError::Decode(e),
            VisionError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Vision(other),
        }
    }
}

impl WorkerError {
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn stage_failed(msg: impl Into<String>) -> Self {
        Self::StageFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Short label used in failure records and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InvalidMetadata(_) => "invalid_metadata",
            WorkerError::Decode(_) => "decode",
            WorkerError::Vision(_) => "vision",
            WorkerError::Cancelled => "cancelled",
            WorkerError::ShuttingDown => "shutting_down",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::JobPanicked(_) => "panicked",
            WorkerError::StageFailed(_) => "stage_failed",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Sink(_) => "sink",
            WorkerError::Io(_) => "io",
            WorkerError::Json(_) => "json",
        }
    }

    /// Run ended by request or deadline rather than by a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::Cancelled | WorkerError::Timeout(_))
    }

    /// The input cannot be analysed; retrying the same job gives the same error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Decode(_) | WorkerError::InvalidMetadata(_) | WorkerError::Vision(_)
        )
    }

    /// Check if error is retryable.
    ///
    /// The input itself is fine; a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::ShuttingDown
                | WorkerError::Timeout(_)
                | WorkerError::Sink(_)
                | WorkerError::Io(_)
        )
    }
}
