//! Caller-facing data service
//!
//! The API the application layer talks to. Reads always come from the local
//! cache (refreshed from the remote when possible); writes take the dual
//! path: direct remote write when online, queued mutation when not. Updates
//! are the exception: they need the authoritative current state, so they are
//! rejected outright while offline instead of being queued.

use std::sync::Arc;

use serde_json::Value;

use crate::connectivity::Connectivity;
use crate::engine::{SyncEngine, SyncOutcome, SyncStatus};
use crate::error::{Error, Result};
use crate::models::{is_temp_id, temp_id, Collection, MutationKind, PendingMutation, Record};
use crate::remote::RemoteBackend;
use crate::store::LocalStore;

/// Application-facing facade over the cache, the queue, and the engine.
pub struct DataService<R: RemoteBackend> {
    store: Arc<LocalStore>,
    remote: R,
    engine: Arc<SyncEngine<R>>,
    connectivity: Connectivity,
}

impl<R: RemoteBackend> DataService<R> {
    pub fn new(
        store: Arc<LocalStore>,
        remote: R,
        engine: Arc<SyncEngine<R>>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            store,
            remote,
            engine,
            connectivity,
        }
    }

    fn can_reach_remote(&self) -> bool {
        self.connectivity.is_online() && self.remote.has_session()
    }

    /// Read a collection, refreshed from the remote store when reachable.
    ///
    /// A failed refresh falls back to the cache; readers never error on
    /// connectivity.
    pub async fn fetch_all<T: Record>(&self) -> Result<Vec<T>> {
        if self.can_reach_remote() {
            if let Err(e) = self.engine.refresh(T::COLLECTION).await {
                tracing::warn!(collection = %T::COLLECTION, error = %e, "refresh failed, serving cache");
            }
        }
        let mut items: Vec<T> = self.store.get_all()?;
        items.sort_by(|a, b| a.natural_cmp(b));
        Ok(items)
    }

    /// Create an entity, preferring a direct remote insert.
    ///
    /// Without connectivity or a session — or when the remote write fails —
    /// the create falls back to the offline path; creates are never lost.
    pub async fn create_online<T: Record>(&self, entity: T) -> Result<T> {
        if !self.can_reach_remote() {
            return self.create_offline(entity);
        }

        let payload = serde_json::to_value(&entity)?;
        let outcome = self
            .remote
            .apply(PendingMutation::create(T::COLLECTION, payload))
            .await;

        match (outcome.is_success(), outcome.new_id) {
            (true, Some(new_id)) => {
                let mut created = entity;
                created.set_id(new_id);
                self.store.save_one(&created)?;
                Ok(created)
            }
            (success, _) => {
                if success {
                    tracing::warn!("remote insert returned no id, queueing create instead");
                } else {
                    tracing::warn!(
                        error = outcome.error.as_deref().unwrap_or("unknown"),
                        "remote insert failed, queueing create instead"
                    );
                }
                self.create_offline(entity)
            }
        }
    }

    /// Create an entity locally under a temporary id and queue the create
    /// for the next sync.
    pub fn create_offline<T: Record>(&self, mut entity: T) -> Result<T> {
        entity.set_id(temp_id());
        self.store.save_one(&entity)?;
        self.engine
            .add_offline_mutation(PendingMutation::create(
                T::COLLECTION,
                serde_json::to_value(&entity)?,
            ))?;
        Ok(entity)
    }

    /// Apply a field patch to an entity, remote-first.
    ///
    /// Rejected synchronously while offline or without a session: an edit
    /// against stale state must not be queued.
    pub async fn update_online<T: Record>(&self, id: &str, patch: Value) -> Result<T> {
        if !self.connectivity.is_online() {
            return Err(Error::Offline(
                "edits require connectivity; try again when online".into(),
            ));
        }
        if !self.remote.has_session() {
            return Err(Error::AuthRequired("edits require a signed-in session".into()));
        }

        let current: T = self
            .store
            .get_one(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let patched = apply_patch(serde_json::to_value(&current)?, patch)?;
        let updated: T = serde_json::from_value(patched.clone())?;

        let outcome = self
            .remote
            .apply(PendingMutation::update(T::COLLECTION, patched))
            .await;
        if !outcome.is_success() {
            return Err(Error::Remote(
                outcome.error.unwrap_or_else(|| "update failed".into()),
            ));
        }

        self.store.save_one(&updated)?;
        Ok(updated)
    }

    /// Delete an entity: locally at once, remotely now or via the queue.
    pub async fn delete_online<T: Record>(&self, id: &str) -> Result<()> {
        self.store.delete_one(T::COLLECTION, id)?;

        if is_temp_id(id) {
            // Never reached the remote; cancel its queued create instead of
            // propagating a delete for an id the server has never seen
            self.cancel_pending_create(T::COLLECTION, id)?;
            return Ok(());
        }

        if self.can_reach_remote() {
            let outcome = self
                .remote
                .apply(PendingMutation::delete(T::COLLECTION, id))
                .await;
            if outcome.is_success() {
                return Ok(());
            }
            tracing::warn!(
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "remote delete failed, queueing for retry"
            );
        }

        self.engine
            .add_offline_mutation(PendingMutation::delete(T::COLLECTION, id))?;
        Ok(())
    }

    fn cancel_pending_create(&self, collection: Collection, entity_id: &str) -> Result<()> {
        for mutation in self.store.pending_mutations()? {
            if mutation.collection == collection
                && mutation.kind == MutationKind::Create
                && mutation.target_id() == Some(entity_id)
            {
                tracing::debug!(entry_id = %mutation.id, "cancelling create for deleted offline entity");
                self.store.mark_synced(&mutation.id)?;
            }
        }
        self.store.prune_synced()
    }

    /// Trigger a flush cycle now.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.engine.sync_now().await
    }

    /// Current sync status snapshot.
    pub fn sync_status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// True when the cache holds any data (first-run detection).
    pub fn has_local_data(&self) -> Result<bool> {
        self.store.is_data_available()
    }

    /// Wipe all local data and the queue (sign-out).
    pub fn reset_local(&self) -> Result<()> {
        self.store.clear_all()
    }
}

/// Shallow-merge a field patch into an entity value; the id is not
/// patchable and `updated_at` is bumped so recency-based merging sees the
/// edit.
fn apply_patch(mut entity: Value, patch: Value) -> Result<Value> {
    let Some(fields) = patch.as_object() else {
        return Err(Error::InvalidInput("patch must be a JSON object".into()));
    };

    let Some(target) = entity.as_object_mut() else {
        return Err(Error::InvalidInput("entity is not a JSON object".into()));
    };

    for (key, value) in fields {
        if key == "id" {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
    target.insert("updated_at".into(), serde_json::to_value(chrono::Utc::now())?);

    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::test_support::MockRemote;
    use crate::models::{Category, FlowKind, Transaction};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn service_with(
        remote: MockRemote,
        online: bool,
    ) -> (tempfile::TempDir, DataService<MockRemote>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let connectivity = Connectivity::new(online);
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            remote.clone(),
            connectivity.clone(),
            EngineSettings::default().with_inter_batch_delay(Duration::from_millis(1)),
        ));
        let service = DataService::new(store, remote, engine, connectivity);
        (dir, service)
    }

    fn transaction() -> Transaction {
        Transaction::new(
            12.5,
            FlowKind::Expense,
            "cat-1",
            "coffee",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_update_is_rejected_not_queued() {
        let (_dir, service) = service_with(MockRemote::online(), false);

        let tx = service.create_offline(transaction()).unwrap();
        let pending_before = service.sync_status().pending_operations;

        let result = service
            .update_online::<Transaction>(&tx.id, json!({ "amount": 20.0 }))
            .await;

        assert!(matches!(result, Err(Error::Offline(_))));
        // Distinct from creates: nothing new was queued
        assert_eq!(service.sync_status().pending_operations, pending_before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_without_session_is_an_auth_error() {
        let remote = MockRemote::online();
        remote.drop_session();
        let (_dir, service) = service_with(remote, true);

        let result = service
            .update_online::<Transaction>("tx-1", json!({ "amount": 20.0 }))
            .await;
        assert!(matches!(result, Err(Error::AuthRequired(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_offline_is_immediately_visible_with_temp_id() {
        let (_dir, service) = service_with(MockRemote::online(), false);

        let created = service.create_offline(transaction()).unwrap();
        assert!(is_temp_id(&created.id));

        let cached: Vec<Transaction> = service.fetch_all().await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, created.id);
        assert_eq!(service.sync_status().pending_operations, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_online_caches_under_the_server_id() {
        let (_dir, service) = service_with(MockRemote::online(), true);

        let created = service.create_online(transaction()).await.unwrap();
        assert_eq!(created.id, "srv-1");

        let cached: Vec<Transaction> = service.fetch_all().await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "srv-1");
        assert_eq!(service.sync_status().pending_operations, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_online_falls_back_to_queue_when_remote_fails() {
        let remote = MockRemote::online();
        let (_dir, service) = service_with(remote.clone(), true);

        let tx = transaction();
        remote.fail_target(&tx.id);

        let created = service.create_online(tx).await.unwrap();
        assert!(is_temp_id(&created.id));
        assert_eq!(service.sync_status().pending_operations, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_online_patches_cache_on_success() {
        let (_dir, service) = service_with(MockRemote::online(), true);

        let created = service.create_online(transaction()).await.unwrap();
        let updated: Transaction = service
            .update_online(&created.id, json!({ "amount": 42.0, "description": "dinner" }))
            .await
            .unwrap();

        assert_eq!(updated.amount, 42.0);
        assert_eq!(updated.description, "dinner");
        assert!(updated.updated_at > created.updated_at);

        let cached: Transaction = service
            .fetch_all::<Transaction>()
            .await
            .unwrap()
            .remove(0);
        assert_eq!(cached.amount, 42.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_offline_removes_locally_and_queues() {
        let remote = MockRemote::online();
        let (_dir, service) = service_with(remote.clone(), false);

        // A permanent-id entity cached from an earlier session
        let mut tx = transaction();
        tx.set_id("srv-9".to_string());
        service.store.save_one(&tx).unwrap();

        service.delete_online::<Transaction>("srv-9").await.unwrap();

        let cached: Vec<Transaction> = service.store.get_all().unwrap();
        assert!(cached.is_empty());

        let pending = service.store.pending_mutations().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, MutationKind::Delete);
        assert_eq!(pending[0].target_id(), Some("srv-9"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_an_unsynced_entity_cancels_its_create() {
        let (_dir, service) = service_with(MockRemote::online(), false);

        let created = service.create_offline(transaction()).unwrap();
        assert_eq!(service.store.pending_count().unwrap(), 1);

        service
            .delete_online::<Transaction>(&created.id)
            .await
            .unwrap();

        assert!(service.store.get_all::<Transaction>().unwrap().is_empty());
        // No create left to resurrect the entity remotely, and no delete
        // queued for an id the server never saw
        assert_eq!(service.store.pending_count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_merges_remote_when_reachable() {
        let remote = MockRemote::online();
        let category = Category::new("Salary", FlowKind::Income);
        remote.set_rows(
            Collection::Categories,
            vec![serde_json::to_value(&category).unwrap()],
        );
        let (_dir, service) = service_with(remote, true);

        let fetched: Vec<Category> = service.fetch_all().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "Salary");

        // Now cached for offline reads too
        let cached: Vec<Category> = service.store.get_all().unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_serves_cache_when_offline() {
        let remote = MockRemote::online();
        let category = Category::new("Salary", FlowKind::Income);
        remote.set_rows(
            Collection::Categories,
            vec![serde_json::to_value(&category).unwrap()],
        );
        let (_dir, service) = service_with(remote, false);

        let fetched: Vec<Category> = service.fetch_all().await.unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn apply_patch_rejects_non_object_patches() {
        let result = apply_patch(json!({ "id": "x" }), json!([1, 2]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn apply_patch_never_rewrites_the_id() {
        let patched = apply_patch(
            json!({ "id": "x", "amount": 1.0 }),
            json!({ "id": "y", "amount": 2.0 }),
        )
        .unwrap();
        assert_eq!(patched["id"], "x");
        assert_eq!(patched["amount"], 2.0);
    }
}
