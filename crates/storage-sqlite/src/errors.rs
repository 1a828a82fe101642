//! Storage-layer error type and its mapping into the core error taxonomy.

use thiserror::Error;

use slainte_core::errors::{Error, StoreError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Query(#[from] diesel::result::Error),

    #[error(transparent)]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking writer task panicked or was cancelled.
    #[error("Writer task failed: {0}")]
    Writer(String),

    /// A stored value could not be decoded back into its domain type.
    #[error("Corrupted record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Domain(#[from] Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Domain(e) => e,
            StorageError::Query(e) => Error::Store(StoreError::QueryFailed(e.to_string())),
            StorageError::Pool(e) => {
                Error::Store(StoreError::ConnectionUnavailable(e.to_string()))
            }
            StorageError::Connection(e) => {
                Error::Store(StoreError::ConnectionUnavailable(e.to_string()))
            }
            StorageError::Migration(m) => Error::Store(StoreError::MigrationFailed(m)),
            StorageError::Io(e) => Error::Store(StoreError::ConnectionUnavailable(e.to_string())),
            StorageError::Writer(m) => Error::Store(StoreError::ConnectionUnavailable(m)),
            StorageError::Corrupt(m) => Error::Store(StoreError::QueryFailed(m)),
        }
    }
}
