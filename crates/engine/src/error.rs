use recsync_source::{MalformedRecordError, SourceError};
use thiserror::Error;

/// Invalid settings. Always raised before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("batch size is required")]
    MissingBatchSize,
    #[error("batch size must be positive, got {0}")]
    InvalidBatchSize(usize),
    #[error("concurrency must be positive, got {0}")]
    InvalidConcurrency(usize),
    #[error("endpoint is required")]
    MissingEndpoint,
    #[error("endpoint {0:?} must be an http:// or https:// URL")]
    InvalidEndpoint(String),
    #[error("{name} must be positive")]
    ZeroDuration { name: &'static str },
    #[error("base delay ({base_ms}ms) exceeds max delay ({max_ms}ms)")]
    InvertedDelays { base_ms: u64, max_ms: u64 },
    #[error("a bearer token and basic auth credentials cannot both be set")]
    ConflictingAuth,
    #[error("basic auth password given without a user")]
    PasswordWithoutUser,
}

/// The dispatcher and aggregator disagree about which outcomes exist.
/// Indicates a bug, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationInvariantError {
    #[error("batch {0} reported more than one outcome")]
    DuplicateOutcome(usize),
    #[error("outcome for unknown batch {0}")]
    UnknownBatch(usize),
    #[error("batch {0} never reported an outcome")]
    MissingOutcome(usize),
    #[error("outcome for batch {batch_index} does not cover exactly its records")]
    RecordMismatch { batch_index: usize },
    #[error("succeeded ({succeeded}) + failed ({failed}) != total ({total})")]
    CountMismatch {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Errors that prevent a report from being produced.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("input error: {0}")]
    Source(#[from] SourceError),

    #[error("internal error: {0}")]
    AggregationInvariant(#[from] AggregationInvariantError),
}

impl SyncError {
    pub fn as_malformed(&self) -> Option<&MalformedRecordError> {
        match self {
            SyncError::Source(e) => e.as_malformed(),
            _ => None,
        }
    }
}
