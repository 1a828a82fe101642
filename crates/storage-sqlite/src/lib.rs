//! SQLite persistence for the offline mutation queue, built on diesel with an
//! r2d2 connection pool and a serialized write handle.

pub mod db;
pub mod errors;
pub mod queue;
pub mod schema;

pub use db::{create_pool, get_connection, init, run_migrations, DbPool, WriteHandle};
pub use errors::StorageError;
pub use queue::SqliteMutationStore;
