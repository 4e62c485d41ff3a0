//! Store Error Types

use thiserror::Error;

/// Cache store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend-level failure (database open, tree ops, flush)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Record (de)serialization failure
    #[error("Store serialization error: {0}")]
    Serialization(String),

    /// Batch exceeds the per-commit limit
    #[error("Batch of {size} exceeds the per-commit limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
