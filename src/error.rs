//! Error types for the entity load pipeline.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to decode {kind} record: {message}")]
    Codec { kind: &'static str, message: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Pipeline errors surfaced to the invoking handler.
///
/// Not-found and not-visible entities are never errors; they resolve as
/// tombstones. Any variant here means registry contents must be discarded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Load pipeline exceeded {cap} iterations with {pending} entries still unresolved")]
    IterationCapExceeded { cap: usize, pending: usize },

    #[error("Load pipeline cancelled before iteration {iteration}")]
    Cancelled { iteration: usize },

    #[error("Load pipeline deadline exceeded before iteration {iteration}")]
    DeadlineExceeded { iteration: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<config::ConfigError> for LoadError {
    fn from(err: config::ConfigError) -> Self {
        LoadError::ConfigError(err.to_string())
    }
}
