//! Sync engine: drains the offline mutation queue against the remote service.
//!
//! A single engine instance owns queue processing for the process. Passes are
//! single-flight: triggers arriving while a pass is running collapse into a
//! no-op instead of queueing behind it, since the running pass already
//! observes the freshest store state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::errors::Result;

use super::connectivity::ConnectivityMonitor;
use super::executor::{ExecutionRequest, RemoteExecutor, RetryClass};
use super::model::{
    MutationPriority, MutationStatus, MutationType, QueueSummary, QueuedMutation,
};
use super::notifier::SyncNotifier;
use super::policy::{
    backoff_with_base, BASE_BACKOFF_SECS, MUTATION_RETENTION_DAYS, SYNC_INTERVAL_JITTER_SECS,
    SYNC_PERIODIC_INTERVAL_SECS,
};
use super::reconcile::IdReconciler;
use super::store::MutationStore;

/// Engine tuning knobs. Defaults match production policy.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub retention_days: i64,
    pub base_backoff_secs: i64,
    pub periodic_interval_secs: u64,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            retention_days: MUTATION_RETENTION_DAYS,
            base_backoff_secs: BASE_BACKOFF_SECS,
            periodic_interval_secs: SYNC_PERIODIC_INTERVAL_SECS,
        }
    }
}

/// Counters for one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Confirmed by the remote service and removed from the queue.
    pub completed: usize,
    /// Failed transiently and rescheduled with backoff.
    pub retried: usize,
    /// Marked failed: permanently rejected or retry budget exhausted.
    pub abandoned: usize,
    /// Skipped this pass: backoff not yet due, or held behind an earlier
    /// mutation for the same entity.
    pub deferred: usize,
    /// Purged by the retention window without ever succeeding.
    pub expired: usize,
    /// Left pending because connectivity dropped mid-pass.
    pub interrupted: usize,
}

/// Result of one processing trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass holds the processing lock; this trigger was dropped.
    AlreadyRunning,
    /// The device is not connected.
    Offline,
    Completed(PassStats),
}

/// Connectivity-aware queue processor.
pub struct SyncEngine {
    store: Arc<dyn MutationStore>,
    executor: Arc<dyn RemoteExecutor>,
    connectivity: Arc<ConnectivityMonitor>,
    notifier: Arc<dyn SyncNotifier>,
    reconciler: IdReconciler,
    config: SyncEngineConfig,
    pass_lock: Mutex<()>,
    retry_timer: std::sync::Mutex<Option<JoinHandle<()>>>,
    background: std::sync::Mutex<Option<JoinHandle<()>>>,
    // Weak handle to ourselves so &self methods can spawn follow-up passes.
    self_ref: std::sync::Mutex<Weak<SyncEngine>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn MutationStore>,
        executor: Arc<dyn RemoteExecutor>,
        connectivity: Arc<ConnectivityMonitor>,
        notifier: Arc<dyn SyncNotifier>,
        config: SyncEngineConfig,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            store,
            executor,
            connectivity,
            notifier,
            reconciler: IdReconciler::new(),
            config,
            pass_lock: Mutex::new(()),
            retry_timer: std::sync::Mutex::new(None),
            background: std::sync::Mutex::new(None),
            self_ref: std::sync::Mutex::new(Weak::new()),
        });
        *engine.self_ref.lock().unwrap() = Arc::downgrade(&engine);
        engine
    }

    fn strong_self(&self) -> Option<Arc<Self>> {
        self.self_ref.lock().unwrap().upgrade()
    }

    /// Crash recovery at startup: downgrade any record stranded in progress
    /// by a previous process, warm the id reconciliation cache, and kick off
    /// a pass when the network path allows it. Returns the number of records
    /// found in the queue.
    pub async fn recover(&self) -> Result<usize> {
        let mappings = self.store.load_id_mappings().await?;
        let mapping_count = mappings.len();
        self.reconciler.warm(mappings);

        let records = self.store.load_all().await?;
        log::info!(
            "[SyncEngine] Recovered {} queued mutations, {} id mappings",
            records.len(),
            mapping_count
        );

        if !records.is_empty() && self.connectivity.is_connected() {
            if let Some(engine) = self.strong_self() {
                tokio::spawn(async move {
                    if let Err(e) = engine.process_pending().await {
                        log::error!("[SyncEngine] Processing pass failed: {}", e);
                    }
                });
            }
        }
        Ok(records.len())
    }

    /// Record a user action for replay. Durable before this returns; a
    /// processing pass is kicked off when the device is connected.
    pub async fn enqueue(
        &self,
        mutation_type: MutationType,
        entity_id: impl Into<String>,
        payload: impl Into<String>,
        priority: MutationPriority,
    ) -> Result<QueuedMutation> {
        let entity_id = entity_id.into();
        if entity_id.is_empty() {
            return Err(crate::errors::Error::validation(
                "mutation entity id must not be empty",
            ));
        }

        let mutation = QueuedMutation::new(mutation_type, entity_id, payload, priority);
        self.store.append(&mutation).await?;
        log::debug!(
            "[SyncEngine] Queued {} for entity {}",
            mutation.mutation_type.label(),
            mutation.entity_id
        );

        if self.connectivity.is_connected() {
            if let Some(engine) = self.strong_self() {
                tokio::spawn(async move {
                    if let Err(e) = engine.process_pending().await {
                        log::error!("[SyncEngine] Processing pass failed: {}", e);
                    }
                });
            }
        }

        Ok(mutation)
    }

    /// Run one processing pass. Single-flight: returns
    /// [`PassOutcome::AlreadyRunning`] without blocking when a pass is
    /// already underway.
    pub async fn process_pending(&self) -> Result<PassOutcome> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            log::debug!("[SyncEngine] Pass already running, trigger dropped");
            return Ok(PassOutcome::AlreadyRunning);
        };

        // The pass itself re-evaluates due times, so a previously armed
        // wakeup is redundant.
        self.cancel_retry_timer();

        // Queued mutations are user intents, not background refresh traffic:
        // any connection carries them, metered or not.
        if !self.connectivity.is_connected() {
            log::debug!("[SyncEngine] Skipping pass, not connected");
            return Ok(PassOutcome::Offline);
        }

        let now = Utc::now();
        let mut stats = PassStats::default();

        let cutoff = now - Duration::days(self.config.retention_days);
        let purged = self.store.purge_expired(cutoff).await?;
        stats.expired = purged.len();
        for mutation in &purged {
            self.notifier.mutation_expired(mutation).await;
        }

        let pending = self.store.list_pending(now).await?;
        if pending.is_empty() {
            return Ok(PassOutcome::Completed(stats));
        }
        log::info!("[SyncEngine] Processing {} pending mutations", pending.len());

        let ordered = order_for_dispatch(pending);
        let mut held_entities: HashSet<String> = HashSet::new();
        let mut earliest_due: Option<DateTime<Utc>> = None;
        let mut iter = ordered.into_iter();

        while let Some(mut mutation) = iter.next() {
            if !self.connectivity.is_connected() {
                log::warn!("[SyncEngine] Connectivity lost mid-pass, stopping");
                stats.interrupted = 1 + iter.len();
                break;
            }

            if held_entities.contains(&mutation.entity_id) {
                stats.deferred += 1;
                continue;
            }

            if let Some(due) = mutation.next_retry_at {
                if due > Utc::now() {
                    // Not due yet. Later mutations for the same entity must
                    // wait behind it.
                    held_entities.insert(mutation.entity_id.clone());
                    earliest_due = Some(earliest_due.map_or(due, |d| d.min(due)));
                    stats.deferred += 1;
                    continue;
                }
            }

            mutation.status = MutationStatus::InProgress;
            mutation.last_attempt_at = Some(Utc::now());
            self.store.update(&mutation).await?;

            let entity_id = self.reconciler.resolve(&mutation.entity_id);
            let request = ExecutionRequest {
                mutation_type: mutation.mutation_type,
                entity_id: &entity_id,
                payload: &mutation.payload,
            };

            match self.executor.execute(request).await {
                Ok(outcome) => {
                    if let Some(server_id) = outcome.server_assigned_id {
                        if mutation.mutation_type.creates_entity() {
                            self.store
                                .record_id_mapping(&mutation.entity_id, &server_id)
                                .await?;
                            self.reconciler.record(&mutation.entity_id, &server_id);
                            log::debug!(
                                "[SyncEngine] Reconciled {} -> {}",
                                mutation.entity_id,
                                server_id
                            );
                        }
                    }
                    self.store.delete(&mutation.id).await?;
                    self.notifier.mutation_completed(&mutation).await;
                    stats.completed += 1;
                }
                Err(e) => match e.retry_class() {
                    RetryClass::Retryable => {
                        let delay = backoff_with_base(
                            self.config.base_backoff_secs,
                            mutation.retry_count,
                        );
                        mutation.retry_count += 1;
                        mutation.last_error = Some(e.to_string());

                        if mutation.is_exhausted() {
                            mutation.status = MutationStatus::Failed;
                            mutation.next_retry_at = None;
                            self.store.update(&mutation).await?;
                            self.notifier
                                .mutation_abandoned(&mutation, &e.to_string())
                                .await;
                            stats.abandoned += 1;
                            log::warn!(
                                "[SyncEngine] Abandoning {} after {} attempts: {}",
                                mutation.id,
                                mutation.retry_count,
                                e
                            );
                        } else {
                            let due = Utc::now() + Duration::seconds(delay);
                            mutation.status = MutationStatus::Pending;
                            mutation.next_retry_at = Some(due);
                            self.store.update(&mutation).await?;
                            earliest_due = Some(earliest_due.map_or(due, |d| d.min(due)));
                            stats.retried += 1;
                            log::debug!(
                                "[SyncEngine] Retry {}/{} for {} in {}s",
                                mutation.retry_count,
                                mutation.max_retries,
                                mutation.id,
                                delay
                            );
                        }
                        held_entities.insert(mutation.entity_id.clone());
                    }
                    RetryClass::Permanent => {
                        mutation.status = MutationStatus::Failed;
                        mutation.next_retry_at = None;
                        mutation.last_error = Some(e.to_string());
                        self.store.update(&mutation).await?;
                        self.notifier
                            .mutation_abandoned(&mutation, &e.to_string())
                            .await;
                        stats.abandoned += 1;
                        held_entities.insert(mutation.entity_id.clone());
                        log::warn!(
                            "[SyncEngine] Permanent rejection for {}: {}",
                            mutation.id,
                            e
                        );
                    }
                },
            }
        }

        let drained = stats.completed > 0
            && stats.retried == 0
            && stats.deferred == 0
            && stats.interrupted == 0;
        if drained {
            self.notifier.queue_drained(stats.completed).await;
            log::info!("[SyncEngine] Queue drained, {} completed", stats.completed);
        }

        if let Some(due) = earliest_due {
            if due > Utc::now() {
                self.arm_retry_timer(due);
            }
        }

        Ok(PassOutcome::Completed(stats))
    }

    /// Reset failed mutations to a fresh pending state and trigger a pass.
    /// The only path that resets retry counters.
    pub async fn retry_failed(&self) -> Result<usize> {
        let reset = self.store.reset_failed().await?;
        log::info!("[SyncEngine] Reset {} failed mutations", reset);

        if reset > 0 && self.connectivity.is_connected() {
            if let Some(engine) = self.strong_self() {
                tokio::spawn(async move {
                    if let Err(e) = engine.process_pending().await {
                        log::error!("[SyncEngine] Processing pass failed: {}", e);
                    }
                });
            }
        }
        Ok(reset)
    }

    /// Drop every queued mutation. Waits for an in-flight pass to finish so
    /// the pass cannot resurrect rows it already read.
    pub async fn clear_all(&self) -> Result<usize> {
        let _guard = self.pass_lock.lock().await;
        self.cancel_retry_timer();
        let removed = self.store.clear().await?;
        log::info!("[SyncEngine] Cleared {} queued mutations", removed);
        Ok(removed)
    }

    /// Queue introspection for UI badges.
    pub async fn summary(&self) -> Result<QueueSummary> {
        let counts = self.store.status_counts().await?;
        let mut summary = QueueSummary::default();
        for count in &counts {
            match count.status {
                MutationStatus::Pending => summary.pending += count.count,
                MutationStatus::InProgress => summary.in_progress += count.count,
                MutationStatus::Failed => summary.failed += count.count,
                MutationStatus::Completed => {}
            }
        }
        summary.by_type = counts;
        Ok(summary)
    }

    /// Start the background triggers: a reachability listener that fires a
    /// pass when the network comes back, and a jittered periodic sweep. The
    /// sweep is background work and respects the link-quality policy;
    /// user-triggered passes only need a connection.
    pub fn start(&self) {
        let mut slot = self.background.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let Some(engine) = self.strong_self() else {
            return;
        };
        let handle = tokio::spawn(async move {
            let mut events = engine.connectivity.subscribe();
            loop {
                let interval = engine.config.periodic_interval_secs
                    + rand::thread_rng().gen_range(0..=SYNC_INTERVAL_JITTER_SECS);
                let trigger = tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) if event.became_reachable => true,
                        Ok(_) => false,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => true,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    },
                    _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {
                        engine.connectivity.should_sync_now()
                    }
                };
                if trigger {
                    if let Err(e) = engine.process_pending().await {
                        log::error!("[SyncEngine] Background pass failed: {}", e);
                    }
                }
            }
        });
        *slot = Some(handle);
        log::info!("[SyncEngine] Background triggers started");
    }

    /// Stop background triggers and wait out any in-flight pass.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.background.lock().unwrap().take() {
            handle.abort();
        }
        self.cancel_retry_timer();
        let _guard = self.pass_lock.lock().await;
        log::info!("[SyncEngine] Shut down");
    }

    fn arm_retry_timer(&self, due: DateTime<Utc>) {
        self.cancel_retry_timer();

        let Some(engine) = self.strong_self() else {
            return;
        };
        let handle = tokio::spawn(async move {
            let wait = (due - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            // Clear our own slot first so the pass does not abort the task
            // it is running on.
            drop(engine.retry_timer.lock().unwrap().take());
            if let Err(e) = engine.process_pending().await {
                log::error!("[SyncEngine] Retry pass failed: {}", e);
            }
        });
        *self.retry_timer.lock().unwrap() = Some(handle);
    }

    fn cancel_retry_timer(&self) {
        if let Some(handle) = self.retry_timer.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Reorder a priority-sorted batch so that mutations targeting the same
/// entity always dispatch in creation order, even when a later one carries a
/// higher priority. Each entity's mutations are re-dealt, oldest first, into
/// the slots that entity occupies in the priority ordering.
fn order_for_dispatch(rows: Vec<QueuedMutation>) -> Vec<QueuedMutation> {
    let mut by_created = rows.clone();
    by_created.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut per_entity: HashMap<String, VecDeque<QueuedMutation>> = HashMap::new();
    for mutation in by_created {
        per_entity
            .entry(mutation.entity_id.clone())
            .or_default()
            .push_back(mutation);
    }

    rows.into_iter()
        .map(|slot| {
            per_entity
                .get_mut(&slot.entity_id)
                .and_then(VecDeque::pop_front)
                .unwrap_or(slot)
        })
        .collect()
}
