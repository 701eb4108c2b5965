//! Error types for the sync engine.
//!
//! Two axes matter downstream: whether an error is fatal to the whole sync
//! or contained to a single partition read, and how it is classified when
//! reported to the operator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Misconfigured engine or stream (bad pool size, unknown stream, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// A protocol invariant was violated by a stream/partition
    /// implementation. Always fatal: continuing would corrupt checkpoints.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A partition declared slice boundaries but its descriptor is missing
    /// or lacks the boundary keys.
    #[error("missing slice boundary for stream '{stream}': {detail}")]
    MissingBoundary { stream: String, detail: String },

    /// A failure local to one partition read. Recoverable: the partition is
    /// finished with an error log and siblings continue.
    #[error("partition read failed for stream '{stream}': {message}")]
    Partition { stream: String, message: String },

    /// Worker pool failure (submit after shutdown, task channel closed).
    #[error("worker pool error: {0}")]
    Pool(String),

    /// A submitted task panicked.
    #[error("worker task panicked: {0}")]
    Panic(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Coarse failure classification surfaced to the operator alongside the
/// error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Configuration,
    Transient,
    Internal,
}

impl SyncError {
    /// Whether this error must abort the whole sync rather than being
    /// contained to one partition.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Partition { .. } | SyncError::Io(_))
    }

    pub fn classify(&self) -> FailureClass {
        match self {
            SyncError::Config(_) | SyncError::MissingBoundary { .. } => {
                FailureClass::Configuration
            }
            SyncError::Partition { .. } | SyncError::Io(_) => FailureClass::Transient,
            SyncError::Invariant(_)
            | SyncError::Pool(_)
            | SyncError::Panic(_)
            | SyncError::Serde(_) => FailureClass::Internal,
        }
    }
}
