//! User-facing queue event notifications.

use async_trait::async_trait;

use super::model::QueuedMutation;

/// Sink for user-visible queue outcomes.
///
/// The host shell plugs in its notification layer here; delivery failures are
/// the sink's problem and must never propagate back into queue processing.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    /// One mutation confirmed by the remote service.
    async fn mutation_completed(&self, mutation: &QueuedMutation);

    /// One mutation abandoned: retry budget exhausted or permanently
    /// rejected. `reason` is the terminal error message.
    async fn mutation_abandoned(&self, mutation: &QueuedMutation, reason: &str);

    /// One mutation purged by the retention window without ever succeeding.
    async fn mutation_expired(&self, mutation: &QueuedMutation);

    /// A processing pass drained the whole queue. `completed` is how many
    /// mutations the pass confirmed.
    async fn queue_drained(&self, completed: usize);
}

/// Discards everything. Default when the host wires no notification layer.
pub struct NoopNotifier;

#[async_trait]
impl SyncNotifier for NoopNotifier {
    async fn mutation_completed(&self, _mutation: &QueuedMutation) {}

    async fn mutation_abandoned(&self, mutation: &QueuedMutation, reason: &str) {
        log::warn!(
            "[SyncEngine] Abandoned {} for entity {}: {}",
            mutation.mutation_type.label(),
            mutation.entity_id,
            reason
        );
    }

    async fn mutation_expired(&self, mutation: &QueuedMutation) {
        log::warn!(
            "[SyncEngine] Expired unsent {} for entity {}",
            mutation.mutation_type.label(),
            mutation.entity_id
        );
    }

    async fn queue_drained(&self, _completed: usize) {}
}
