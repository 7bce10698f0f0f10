//! Sync engine
//!
//! The stateful coordinator between the local cache, the offline queue, and
//! the remote store. At most one flush cycle runs at a time; connectivity
//! transitions and remote change events trigger cycles opportunistically.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::EngineSettings;
use crate::connectivity::{Connectivity, Subscription};
use crate::error::{Error, Result};
use crate::merge::merge;
use crate::models::{
    is_temp_id, Category, Collection, MutationKind, PendingMutation, Record, SavingsGoal,
    SavingsTransaction, Transaction,
};
use crate::reconcile::reconcile;
use crate::remote::{apply_batch, RemoteBackend};
use crate::store::LocalStore;

/// Engine state, one per device session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Syncing,
    Error,
}

/// Snapshot of the engine state for callers to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_operations: usize,
    pub error: Option<String>,
}

/// How a `sync_now` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A flush cycle ran; counts of confirmed and still-pending operations
    Completed { synced: usize, failed: usize },
    /// Another cycle was already running; nothing was done
    AlreadySyncing,
    /// No connectivity; nothing was attempted
    Offline,
    /// No authenticated session; nothing was attempted
    NoSession,
    /// The availability probe failed; the queue is untouched
    RemoteUnavailable,
}

/// A change notification for one collection, fed from the remote store's
/// realtime feed by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
}

struct StatusInner {
    phase: SyncPhase,
    last_sync_time: Option<DateTime<Utc>>,
    pending_operations: usize,
    error: Option<String>,
}

/// The sync coordinator. Constructed once at startup and shared via `Arc`.
pub struct SyncEngine<R: RemoteBackend> {
    store: Arc<LocalStore>,
    remote: R,
    connectivity: Connectivity,
    settings: EngineSettings,
    status: RwLock<StatusInner>,
    cycle_guard: tokio::sync::Mutex<()>,
}

impl<R: RemoteBackend> SyncEngine<R> {
    pub fn new(
        store: Arc<LocalStore>,
        remote: R,
        connectivity: Connectivity,
        settings: EngineSettings,
    ) -> Self {
        let last_sync_time = store.last_sync_time().ok().flatten();
        let pending_operations = store.pending_count().unwrap_or(0);

        Self {
            store,
            remote,
            connectivity,
            settings,
            status: RwLock::new(StatusInner {
                phase: SyncPhase::Idle,
                last_sync_time,
                pending_operations,
                error: None,
            }),
            cycle_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status.read().map_or(
            SyncStatus {
                is_syncing: false,
                last_sync_time: None,
                pending_operations: 0,
                error: None,
            },
            |inner| SyncStatus {
                is_syncing: inner.phase == SyncPhase::Syncing,
                last_sync_time: inner.last_sync_time,
                pending_operations: inner.pending_operations,
                error: inner.error.clone(),
            },
        )
    }

    pub fn is_syncing(&self) -> bool {
        self.status
            .read()
            .map(|inner| inner.phase == SyncPhase::Syncing)
            .unwrap_or(false)
    }

    /// Record a mutation made while offline; returns the queue-entry id.
    pub fn add_offline_mutation(&self, mutation: PendingMutation) -> Result<String> {
        let entry_id = self.store.enqueue(mutation)?;
        let pending = self.store.pending_count()?;
        self.update_status(|inner| inner.pending_operations = pending);
        tracing::debug!(%entry_id, pending, "queued offline mutation");
        Ok(entry_id)
    }

    /// Flush the offline queue against the remote store.
    ///
    /// At most one cycle runs at a time; a call while another cycle is in
    /// flight returns [`SyncOutcome::AlreadySyncing`] without doing any I/O.
    /// Failures are recorded per operation and never roll back successes:
    /// the remainder retries on the next cycle.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::debug!("sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadySyncing);
        };

        if !self.connectivity.is_online() {
            self.fail_cycle("offline")?;
            return Ok(SyncOutcome::Offline);
        }
        if !self.remote.has_session() {
            self.fail_cycle("authentication required")?;
            return Ok(SyncOutcome::NoSession);
        }

        // Every new attempt starts clean; errors are not sticky
        self.update_status(|inner| {
            inner.phase = SyncPhase::Syncing;
            inner.error = None;
        });

        let pending = self.store.pending_mutations()?;
        if pending.is_empty() {
            let now = Utc::now();
            self.store.set_last_sync_time(now)?;
            self.update_status(|inner| {
                inner.phase = SyncPhase::Idle;
                inner.last_sync_time = Some(now);
                inner.pending_operations = 0;
            });
            return Ok(SyncOutcome::Completed {
                synced: 0,
                failed: 0,
            });
        }

        if !self.remote.probe_availability().await {
            self.fail_cycle("remote store unreachable")?;
            return Ok(SyncOutcome::RemoteUnavailable);
        }

        tracing::info!(pending = pending.len(), "flushing offline queue");
        let report = apply_batch(
            &self.remote,
            pending,
            self.settings.batch_size,
            self.settings.inter_batch_delay,
        )
        .await;

        for outcome in &report.successful {
            self.store.mark_synced(&outcome.mutation.id)?;

            if outcome.mutation.kind == MutationKind::Create {
                if let (Some(temp), Some(permanent)) =
                    (outcome.mutation.target_id(), outcome.new_id.as_deref())
                {
                    if is_temp_id(temp) {
                        reconcile(&self.store, outcome.mutation.collection, temp, permanent)?;
                    }
                }
            }
        }
        self.store.prune_synced()?;

        let now = Utc::now();
        self.store.set_last_sync_time(now)?;
        let remaining = self.store.pending_count()?;
        let synced = report.successful.len();
        let failed = report.failed.len();

        if failed > 0 {
            for outcome in &report.failed {
                tracing::warn!(
                    entry_id = %outcome.mutation.id,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "operation left in queue for retry"
                );
            }
            self.update_status(|inner| {
                inner.phase = SyncPhase::Error;
                inner.last_sync_time = Some(now);
                inner.pending_operations = remaining;
                inner.error = Some(format!("{failed} operations failed"));
            });
        } else {
            tracing::info!(synced, "offline queue drained");
            self.update_status(|inner| {
                inner.phase = SyncPhase::Idle;
                inner.last_sync_time = Some(now);
                inner.pending_operations = remaining;
            });
        }

        Ok(SyncOutcome::Completed { synced, failed })
    }

    /// Re-fetch one collection and merge it into the cache.
    pub async fn refresh(&self, collection: Collection) -> Result<()> {
        match collection {
            Collection::Transactions => self.refresh_collection::<Transaction>().await,
            Collection::Categories => self.refresh_collection::<Category>().await,
            Collection::SavingsGoals => self.refresh_collection::<SavingsGoal>().await,
            Collection::SavingsTransactions => {
                self.refresh_collection::<SavingsTransaction>().await
            }
        }
    }

    async fn refresh_collection<T: Record>(&self) -> Result<()> {
        let remote_values = self
            .remote
            .fetch_all(T::COLLECTION)
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        let remote: Vec<T> = remote_values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()?;

        let local: Vec<T> = self.store.get_all()?;
        let merged = merge(local, remote);
        self.store.save_all(&merged)?;
        tracing::debug!(collection = %T::COLLECTION, count = merged.len(), "collection refreshed");
        Ok(())
    }

    /// Start the connectivity watcher: when connectivity returns and the
    /// queue is non-empty, sync after a debounce delay (flap protection).
    pub fn spawn_auto_sync(self: &Arc<Self>) -> Subscription {
        let engine = Arc::clone(self);
        let mut watch = engine.connectivity.watch();

        let task = tokio::spawn(async move {
            let mut was_online = *watch.borrow();
            while watch.changed().await.is_ok() {
                let online = *watch.borrow();
                let restored = online && !was_online;
                was_online = online;
                if !restored {
                    continue;
                }

                tokio::time::sleep(engine.settings.debounce).await;
                if !engine.connectivity.is_online() {
                    continue;
                }
                if engine.store.pending_count().unwrap_or(0) == 0 {
                    continue;
                }

                tracing::info!("connectivity restored, flushing offline queue");
                if let Err(e) = engine.sync_now().await {
                    tracing::warn!(error = %e, "auto sync failed");
                }
            }
        });

        Subscription::new(task)
    }

    /// Start the remote change listener: each event triggers an
    /// opportunistic refresh of the changed collection while online and not
    /// already syncing.
    pub fn spawn_change_listener(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ChangeEvent>,
    ) -> Subscription {
        let engine = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !engine.connectivity.is_online() || engine.is_syncing() {
                    continue;
                }
                if let Err(e) = engine.refresh(event.collection).await {
                    tracing::warn!(collection = %event.collection, error = %e, "change-driven refresh failed");
                }
            }
        });

        Subscription::new(task)
    }

    fn update_status(&self, update: impl FnOnce(&mut StatusInner)) {
        if let Ok(mut inner) = self.status.write() {
            update(&mut inner);
        }
    }

    fn fail_cycle(&self, message: &str) -> Result<()> {
        tracing::debug!(message, "sync cycle not started");
        let pending = self.store.pending_count()?;
        self.update_status(|inner| {
            inner.phase = SyncPhase::Error;
            inner.pending_operations = pending;
            inner.error = Some(message.to_string());
        });
        Ok(())
    }
}
