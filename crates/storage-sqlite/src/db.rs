//! Connection pool, migrations, and the serialized write handle.

use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use slainte_core::errors::Result;

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const DB_FILE_NAME: &str = "slainte.db";
const POOL_MAX_SIZE: u32 = 4;

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Resolve the database path under the app data directory, creating the
/// directory when missing.
pub fn init(app_data_dir: &str) -> Result<String> {
    let dir = Path::new(app_data_dir);
    std::fs::create_dir_all(dir).map_err(StorageError::from)?;
    Ok(dir.join(DB_FILE_NAME).to_string_lossy().to_string())
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    log::debug!("[MutationStore] Migrations up to date at {}", db_path);
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .map_err(StorageError::from)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    Ok(pool.get().map_err(StorageError::from)?)
}

/// Serialized write access to the database.
///
/// SQLite permits one writer at a time; write jobs take the gate in turn and
/// run on the blocking pool, each wrapped in an immediate transaction so a
/// failing job leaves no partial state behind.
#[derive(Clone)]
pub struct WriteHandle {
    pool: Arc<DbPool>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl WriteHandle {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _gate = self.gate.lock().await;
        let pool = Arc::clone(&self.pool);
        let outcome = tokio::task::spawn_blocking(
            move || -> std::result::Result<T, StorageError> {
                let mut conn = pool.get().map_err(StorageError::from)?;
                conn.immediate_transaction::<T, StorageError, _>(|conn| {
                    job(conn).map_err(StorageError::from)
                })
            },
        )
        .await
        .map_err(|e| StorageError::Writer(e.to_string()))?;
        outcome.map_err(Into::into)
    }
}
