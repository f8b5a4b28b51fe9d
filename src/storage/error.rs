//! Storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Every variant is fatal to the crawl: progress that cannot be recorded
/// must not be silently dropped.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint at {path} is unreadable: {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("Invalid auction id for storage: {0:?}")]
    InvalidAuctionId(String),
}

impl From<tempfile::PersistError> for StorageError {
    fn from(e: tempfile::PersistError) -> Self {
        Self::Io(e.error)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
