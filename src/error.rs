//! Error type shared by the engine, configuration, and JSON operations.

use thiserror::Error;

/// Errors produced by the MinHash engine.
///
/// Expected outcomes such as an empty dataset, unseen features, or fewer
/// candidates than requested are not errors; they surface as empty indexes
/// and `-1` padded results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinHashError {
    /// Invalid parameter combination, detected before any computation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An indexed query referenced an id outside `[0, len)`.
    #[error("unknown instance {id}: index holds {len} instances")]
    UnknownInstance { id: usize, len: usize },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    /// Malformed input rows.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<rayon::ThreadPoolBuildError> for MinHashError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MinHashError>;
