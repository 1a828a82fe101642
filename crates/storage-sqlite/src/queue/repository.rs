//! Diesel-backed implementation of the mutation store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;

use slainte_core::errors::{Error, Result, StoreError};
use slainte_core::queue::{
    MutationCount, MutationPriority, MutationStatus, MutationStore, QueuedMutation,
    MUTATION_RETENTION_DAYS,
};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{id_reconciliation, mutation_outbox};

use super::model::{IdMappingDB, MutationRowDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

fn timestamp_to_db(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn timestamp_from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::from(StorageError::Corrupt(format!(
                "invalid timestamp '{}': {}",
                value, e
            )))
        })
}

fn to_row(mutation: &QueuedMutation) -> Result<MutationRowDB> {
    Ok(MutationRowDB {
        id: mutation.id.clone(),
        mutation_type: enum_to_db(&mutation.mutation_type)?,
        entity_id: mutation.entity_id.clone(),
        payload: mutation.payload.clone(),
        priority: mutation.priority.rank(),
        created_at: timestamp_to_db(&mutation.created_at),
        last_attempt_at: mutation.last_attempt_at.as_ref().map(timestamp_to_db),
        retry_count: mutation.retry_count,
        max_retries: mutation.max_retries,
        next_retry_at: mutation.next_retry_at.as_ref().map(timestamp_to_db),
        status: enum_to_db(&mutation.status)?,
        last_error: mutation.last_error.clone(),
    })
}

fn from_row(row: MutationRowDB) -> Result<QueuedMutation> {
    Ok(QueuedMutation {
        id: row.id,
        mutation_type: enum_from_db(&row.mutation_type)?,
        entity_id: row.entity_id,
        payload: row.payload,
        priority: MutationPriority::from_rank(row.priority),
        created_at: timestamp_from_db(&row.created_at)?,
        last_attempt_at: row
            .last_attempt_at
            .as_deref()
            .map(timestamp_from_db)
            .transpose()?,
        retry_count: row.retry_count,
        max_retries: row.max_retries,
        next_retry_at: row
            .next_retry_at
            .as_deref()
            .map(timestamp_from_db)
            .transpose()?,
        status: enum_from_db(&row.status)?,
        last_error: row.last_error,
    })
}

/// Mutation queue persistence over the app's SQLite database. Reads go
/// straight to the pool; writes are funneled through the serialized
/// [`WriteHandle`].
pub struct SqliteMutationStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteMutationStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl MutationStore for SqliteMutationStore {
    async fn append(&self, mutation: &QueuedMutation) -> Result<()> {
        let row = to_row(mutation)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(mutation_outbox::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, mutation: &QueuedMutation) -> Result<()> {
        let row = to_row(mutation)?;
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(mutation_outbox::table.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Err(StoreError::NotFound(row.id.clone()).into());
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(mutation_outbox::table.find(id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<QueuedMutation>> {
        let mut conn = get_connection(&self.pool)?;
        let retention_cutoff =
            timestamp_to_db(&(now - chrono::Duration::days(MUTATION_RETENTION_DAYS)));

        let rows = mutation_outbox::table
            .filter(mutation_outbox::status.eq(enum_to_db(&MutationStatus::Pending)?))
            .filter(mutation_outbox::retry_count.lt(mutation_outbox::max_retries))
            .filter(mutation_outbox::created_at.ge(retention_cutoff))
            .order((
                mutation_outbox::priority.desc(),
                mutation_outbox::created_at.asc(),
            ))
            .load::<MutationRowDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter().map(from_row).collect()
    }

    async fn load_all(&self) -> Result<Vec<QueuedMutation>> {
        self.writer
            .exec(move |conn| {
                // Rows stranded in progress by a crash go back to pending.
                diesel::update(
                    mutation_outbox::table.filter(
                        mutation_outbox::status.eq(enum_to_db(&MutationStatus::InProgress)?),
                    ),
                )
                .set(mutation_outbox::status.eq(enum_to_db(&MutationStatus::Pending)?))
                .execute(conn)
                .map_err(StorageError::from)?;

                let rows = mutation_outbox::table
                    .order(mutation_outbox::created_at.asc())
                    .load::<MutationRowDB>(conn)
                    .map_err(StorageError::from)?;
                rows.into_iter().map(from_row).collect()
            })
            .await
    }

    async fn reset_failed(&self) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let reset = diesel::update(
                    mutation_outbox::table.filter(
                        mutation_outbox::status
                            .eq(enum_to_db(&MutationStatus::Failed)?)
                            .or(mutation_outbox::retry_count.ge(mutation_outbox::max_retries)),
                    ),
                )
                .set((
                    mutation_outbox::status.eq(enum_to_db(&MutationStatus::Pending)?),
                    mutation_outbox::retry_count.eq(0),
                    mutation_outbox::next_retry_at.eq::<Option<String>>(None),
                    mutation_outbox::last_error.eq::<Option<String>>(None),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(reset)
            })
            .await
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueuedMutation>> {
        let cutoff_db = timestamp_to_db(&cutoff);
        self.writer
            .exec(move |conn| {
                let rows = mutation_outbox::table
                    .filter(mutation_outbox::created_at.lt(&cutoff_db))
                    .load::<MutationRowDB>(conn)
                    .map_err(StorageError::from)?;

                diesel::delete(
                    mutation_outbox::table.filter(mutation_outbox::created_at.lt(&cutoff_db)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                rows.into_iter().map(from_row).collect()
            })
            .await
    }

    async fn clear(&self) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let removed = diesel::delete(mutation_outbox::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(removed)
            })
            .await
    }

    async fn status_counts(&self) -> Result<Vec<MutationCount>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = mutation_outbox::table
            .group_by((mutation_outbox::mutation_type, mutation_outbox::status))
            .select((
                mutation_outbox::mutation_type,
                mutation_outbox::status,
                count_star(),
            ))
            .load::<(String, String, i64)>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|(mutation_type, status, count)| {
                Ok(MutationCount {
                    mutation_type: enum_from_db(&mutation_type)?,
                    status: enum_from_db(&status)?,
                    count,
                })
            })
            .collect()
    }

    async fn record_id_mapping(&self, local_id: &str, server_id: &str) -> Result<()> {
        let row = IdMappingDB {
            local_id: local_id.to_string(),
            server_id: server_id.to_string(),
            created_at: timestamp_to_db(&Utc::now()),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(id_reconciliation::table)
                    .values(&row)
                    .on_conflict(id_reconciliation::local_id)
                    .do_update()
                    .set(id_reconciliation::server_id.eq(&row.server_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn load_id_mappings(&self) -> Result<Vec<(String, String)>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = id_reconciliation::table
            .load::<IdMappingDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.local_id, row.server_id))
            .collect())
    }
}
