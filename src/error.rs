// src/error.rs
// Error type for the recovery engine.

use thiserror::Error;

/// Errors surfaced by marker decoding, catalog access, and replay.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted marker: {0}")]
    Corruption(String),

    #[error("database {0} not found")]
    DatabaseNotFound(u64),

    #[error("collection {0} not found")]
    CollectionNotFound(u64),

    #[error("collection {0} is corrupted")]
    CorruptedCollection(u64),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolated(String),

    #[error("WAL append failed: {0}")]
    WalAppend(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("recovery aborted after {error_count} error(s)")]
    Recovery { error_count: u32 },
}

impl From<serde_json::Error> for RecoveryError {
    fn from(err: serde_json::Error) -> Self {
        RecoveryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
