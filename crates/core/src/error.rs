//! Error model for the job lifecycle.

use thiserror::Error;

/// Result type used by job steps.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of one lifecycle step.
///
/// Every variant is recoverable by retry: the run is abandoned, the retry
/// counter grows and the job stays schedulable until the retry budget runs out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("config load failed: {0}")]
    ConfigLoad(String),

    #[error("fetch page failed: {0}")]
    Fetch(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("checkpoint persist failed: {0}")]
    CheckpointPersist(String),

    /// Post-run hook failure. The checkpoint has already advanced.
    #[error("completion hook failed: {0}")]
    Hook(String),
}

impl SyncError {
    pub fn config_load(msg: impl Into<String>) -> Self {
        Self::ConfigLoad(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::CheckpointPersist(msg.into())
    }

    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }
}

/// A persisted status code outside the known set.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown status code: {0}")]
pub struct UnknownStatus(pub i8);

/// A config field was applied to a cursor shape that does not carry it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("field `{field}` does not apply to a `{shape}` cursor")]
pub struct ConfigFieldError {
    pub field: &'static str,
    pub shape: &'static str,
}
