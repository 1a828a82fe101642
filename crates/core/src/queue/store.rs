//! Durable store contract for queued mutations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

use super::model::{MutationCount, QueuedMutation};

/// Durable CRUD over queued mutations.
///
/// The sync engine is the single writer; implementations only need atomicity
/// with respect to one writer plus concurrent readers. The store is the
/// single source of truth; any in-memory view must be rebuildable from it.
#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Persist a new record. Fails only on underlying storage I/O errors.
    async fn append(&self, mutation: &QueuedMutation) -> Result<()>;

    /// Full-record replace by id. A missing id is an error, never a silent
    /// no-op, to guard against in-memory/persisted desync.
    async fn update(&self, mutation: &QueuedMutation) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// All pending work eligible at `now`: excludes exhausted retry budgets
    /// and retention-expired rows; ordered by priority descending, then
    /// creation time ascending. Due-time gating on `next_retry_at` is the
    /// engine's responsibility so same-entity ordering can be enforced.
    async fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<QueuedMutation>>;

    /// Full recovery scan at process start. Any persisted `InProgress` row
    /// is downgraded to `Pending` before being returned.
    async fn load_all(&self) -> Result<Vec<QueuedMutation>>;

    /// Reset every failed or retry-exhausted row back to a fresh pending
    /// state, returning the number of rows reset. The only path that resets
    /// a retry counter.
    async fn reset_failed(&self) -> Result<usize>;

    /// Delete rows created before `cutoff`, returning them so expiry stays
    /// observable to callers.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueuedMutation>>;

    /// Delete everything. Destructive, user-initiated.
    async fn clear(&self) -> Result<usize>;

    /// Row counts grouped by (type, status).
    async fn status_counts(&self) -> Result<Vec<MutationCount>>;

    /// Persist a local-placeholder → server id mapping.
    async fn record_id_mapping(&self, local_id: &str, server_id: &str) -> Result<()>;

    /// All persisted id mappings, used to warm the in-memory reconciler.
    async fn load_id_mappings(&self) -> Result<Vec<(String, String)>>;
}
