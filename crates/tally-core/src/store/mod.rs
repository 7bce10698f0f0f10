//! Local durable cache
//!
//! Persists entity collections, the offline mutation queue, and sync
//! metadata on the device. Two tiers implement [`StorageTier`]: the
//! structured SQLite tier and a flat JSON-file tier. [`LocalStore`] fronts
//! both: when a structured operation fails it degrades to the flat tier for
//! the rest of the session and retries the same operation there, so callers
//! never see the tier distinction.

mod flat;
mod migrations;
mod sqlite;
mod tier;

pub use flat::FlatFileStore;
pub use sqlite::SqliteStore;
pub use tier::StorageTier;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Collection, PendingMutation, Record};

/// Meta key holding the RFC 3339 timestamp of the last successful sync.
pub const LAST_SYNC_META_KEY: &str = "last_sync_time";

const DB_FILE: &str = "tally.db";
const FLAT_FILE: &str = "tally-cache.json";

/// The device-local cache used by the sync engine and the data service.
pub struct LocalStore {
    structured: Option<SqliteStore>,
    flat: FlatFileStore,
    degraded: AtomicBool,
}

impl LocalStore {
    /// Open the cache in the given data directory.
    ///
    /// A structured-tier failure here (or later) is not surfaced: the store
    /// silently runs on the flat tier instead.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let flat = FlatFileStore::open(dir.join(FLAT_FILE))?;
        let structured = match SqliteStore::open(dir.join(DB_FILE)) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "structured cache unavailable, using flat tier");
                None
            }
        };

        let degraded = AtomicBool::new(structured.is_none());
        Ok(Self {
            structured,
            flat,
            degraded,
        })
    }

    /// True once the store has fallen back to the flat tier.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Run an operation against the active tier, degrading permanently on
    /// the first structured-tier failure and retrying on the flat tier.
    fn run<T>(&self, op: impl Fn(&dyn StorageTier) -> Result<T>) -> Result<T> {
        if !self.is_degraded() {
            if let Some(structured) = &self.structured {
                match op(structured) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        tracing::warn!(error = %e, "structured cache failed, degrading to flat tier");
                        self.degraded.store(true, Ordering::Relaxed);
                    }
                }
            }
        }
        op(&self.flat)
    }

    // --- typed collection access ---

    pub fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        let values = self.run(|tier| tier.get_all(T::COLLECTION))?;
        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .collect()
    }

    pub fn save_all<T: Record>(&self, items: &[T]) -> Result<()> {
        let values = items
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.run(|tier| tier.save_all(T::COLLECTION, &values))
    }

    pub fn get_one<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let value = self.run(|tier| tier.get_one(T::COLLECTION, id))?;
        value
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .transpose()
    }

    pub fn save_one<T: Record>(&self, item: &T) -> Result<()> {
        let value = serde_json::to_value(item)?;
        self.run(|tier| tier.save_one(T::COLLECTION, &value))
    }

    // --- raw collection access (reconciliation, refresh) ---

    pub fn get_all_values(&self, collection: Collection) -> Result<Vec<Value>> {
        self.run(|tier| tier.get_all(collection))
    }

    pub fn save_all_values(&self, collection: Collection, items: &[Value]) -> Result<()> {
        self.run(|tier| tier.save_all(collection, items))
    }

    pub fn get_one_value(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        self.run(|tier| tier.get_one(collection, id))
    }

    pub fn save_one_value(&self, collection: Collection, item: &Value) -> Result<()> {
        self.run(|tier| tier.save_one(collection, item))
    }

    pub fn delete_one(&self, collection: Collection, id: &str) -> Result<()> {
        self.run(|tier| tier.delete_one(collection, id))
    }

    pub fn swap_id(&self, collection: Collection, old_id: &str, new_id: &str) -> Result<()> {
        self.run(|tier| tier.swap_id(collection, old_id, new_id))
    }

    // --- offline mutation queue ---

    /// Append a mutation to the queue; returns the queue-entry id.
    pub fn enqueue(&self, mutation: PendingMutation) -> Result<String> {
        self.run(|tier| tier.enqueue(&mutation))?;
        Ok(mutation.id)
    }

    pub fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        self.run(|tier| tier.pending_mutations())
    }

    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.pending_mutations()?.len())
    }

    pub fn mark_synced(&self, entry_id: &str) -> Result<()> {
        self.run(|tier| tier.mark_synced(entry_id))
    }

    pub fn rewrite_payload(&self, entry_id: &str, payload: &Value) -> Result<()> {
        self.run(|tier| tier.rewrite_payload(entry_id, payload))
    }

    pub fn prune_synced(&self) -> Result<()> {
        self.run(|tier| tier.prune_synced())
    }

    // --- sync metadata ---

    pub fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let raw = self.run(|tier| tier.meta(LAST_SYNC_META_KEY))?;
        Ok(raw.and_then(|value| {
            DateTime::parse_from_rfc3339(&value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    pub fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.run(|tier| tier.set_meta(LAST_SYNC_META_KEY, &at.to_rfc3339()))
    }

    // --- lifecycle ---

    /// Wipe every collection, the queue, and metadata (sign-out / reset).
    pub fn clear_all(&self) -> Result<()> {
        self.run(|tier| tier.clear_all())
    }

    pub fn is_data_available(&self) -> Result<bool> {
        self.run(|tier| tier.is_data_available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, FlowKind};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn typed_round_trip_through_structured_tier() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(!store.is_degraded());

        let category = Category::new("Groceries", FlowKind::Expense);
        store.save_one(&category).unwrap();

        let loaded: Category = store.get_one(category.id()).unwrap().unwrap();
        assert_eq!(loaded, category);
        assert!(store.is_data_available().unwrap());
    }

    #[test]
    fn queue_survives_store_reopen() {
        let dir = tempdir().unwrap();
        let mutation = PendingMutation::delete(Collection::Transactions, "tx-1");
        let entry_id = {
            let store = LocalStore::open(dir.path()).unwrap();
            store.enqueue(mutation.clone()).unwrap()
        };

        // Simulated process restart: reload from persisted state
        let reopened = LocalStore::open(dir.path()).unwrap();
        let pending = reopened.pending_mutations().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, entry_id);
        assert!(!pending[0].synced);
    }

    #[test]
    fn degrades_to_flat_tier_when_structured_cannot_open() {
        let dir = tempdir().unwrap();
        // A directory squatting on the database path makes the SQLite open fail
        fs::create_dir_all(dir.path().join(DB_FILE)).unwrap();

        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.is_degraded());

        let category = Category::new("Rent", FlowKind::Expense);
        store.save_one(&category).unwrap();

        let all: Vec<Category> = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.is_data_available().unwrap());

        // Degradation sticks across reads and writes within the session
        assert!(store.is_degraded());
    }

    #[test]
    fn last_sync_time_round_trips() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.last_sync_time().unwrap().is_none());

        let now = Utc::now();
        store.set_last_sync_time(now).unwrap();

        let loaded = store.last_sync_time().unwrap().unwrap();
        assert_eq!(loaded.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn clear_all_resets_both_data_and_queue() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        store
            .save_one(&Category::new("Rent", FlowKind::Expense))
            .unwrap();
        store
            .enqueue(PendingMutation::delete(Collection::Categories, "x"))
            .unwrap();

        store.clear_all().unwrap();
        assert!(!store.is_data_available().unwrap());
        assert_eq!(store.pending_count().unwrap(), 0);
    }
}
