//! Shared error types for the core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the durable mutation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage query failed (I/O, corruption, constraint).
    #[error("Storage query failed: {0}")]
    QueryFailed(String),

    /// No connection could be checked out of the pool.
    #[error("Storage connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// Schema migration could not be applied.
    #[error("Storage migration failed: {0}")]
    MigrationFailed(String),

    /// An update or lookup referenced an id that is not persisted. Surfaced
    /// as an error rather than a silent no-op so in-memory state can never
    /// drift away from the store unnoticed.
    #[error("No queued mutation with id '{0}'")]
    NotFound(String),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
