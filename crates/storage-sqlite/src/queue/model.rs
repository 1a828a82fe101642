//! Database models for the mutation queue tables.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::mutation_outbox)]
// Updates are full-record replaces; cleared nullable columns must be
// written back as NULL rather than skipped.
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MutationRowDB {
    pub id: String,
    pub mutation_type: String,
    pub entity_id: String,
    pub payload: String,
    pub priority: i32,
    pub created_at: String,
    pub last_attempt_at: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<String>,
    pub status: String,
    pub last_error: Option<String>,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(local_id))]
#[diesel(table_name = crate::schema::id_reconciliation)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IdMappingDB {
    pub local_id: String,
    pub server_id: String,
    pub created_at: String,
}
