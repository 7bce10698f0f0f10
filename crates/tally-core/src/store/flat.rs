//! Flat file cache tier
//!
//! A single JSON document on disk, used when the structured tier cannot be
//! opened or fails mid-session. Slower and coarser than SQLite, but it keeps
//! the cache and the offline queue durable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tier::{value_id, StorageTier};
use crate::error::{Error, Result};
use crate::models::{Collection, PendingMutation};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlatState {
    #[serde(default)]
    collections: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    queue: Vec<PendingMutation>,
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

/// Flat key-value implementation of [`StorageTier`].
pub struct FlatFileStore {
    path: PathBuf,
    state: Mutex<FlatState>,
}

impl FlatFileStore {
    /// Load the flat store from disk, starting empty when the file is
    /// missing. An unreadable (corrupt) file also starts empty rather than
    /// taking the last storage tier down with it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "flat cache unreadable, starting empty");
                FlatState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FlatState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Where this store persists its data.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> Result<MutexGuard<'_, FlatState>> {
        self.state
            .lock()
            .map_err(|_| Error::Database("flat cache state poisoned".into()))
    }

    fn persist(&self, state: &FlatState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(state)?)?;
        Ok(())
    }

    fn with_state<T>(&self, op: impl FnOnce(&mut FlatState) -> T) -> Result<T> {
        let mut state = self.state()?;
        let result = op(&mut state);
        self.persist(&state)?;
        Ok(result)
    }
}

impl StorageTier for FlatFileStore {
    fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(collection.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()> {
        self.with_state(|state| {
            state
                .collections
                .insert(collection.as_str().to_string(), items.to_vec());
        })
    }

    fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(collection.as_str())
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
            })
            .cloned())
    }

    fn save_one(&self, collection: Collection, item: &Value) -> Result<()> {
        let id = value_id(item)?.to_string();
        self.with_state(|state| {
            let items = state
                .collections
                .entry(collection.as_str().to_string())
                .or_default();
            match items
                .iter_mut()
                .find(|existing| existing.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                Some(existing) => *existing = item.clone(),
                None => items.push(item.clone()),
            }
        })
    }

    fn delete_one(&self, collection: Collection, id: &str) -> Result<()> {
        self.with_state(|state| {
            if let Some(items) = state.collections.get_mut(collection.as_str()) {
                items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
            }
        })
    }

    fn swap_id(&self, collection: Collection, old_id: &str, new_id: &str) -> Result<()> {
        self.with_state(|state| {
            if let Some(items) = state.collections.get_mut(collection.as_str()) {
                for item in items.iter_mut() {
                    if item.get("id").and_then(Value::as_str) == Some(old_id) {
                        item["id"] = Value::String(new_id.to_string());
                    }
                }
            }
        })
    }

    fn enqueue(&self, mutation: &PendingMutation) -> Result<()> {
        self.with_state(|state| state.queue.push(mutation.clone()))
    }

    fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        let state = self.state()?;
        let mut pending: Vec<PendingMutation> = state
            .queue
            .iter()
            .filter(|mutation| !mutation.synced)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(pending)
    }

    fn mark_synced(&self, entry_id: &str) -> Result<()> {
        self.with_state(|state| {
            if let Some(mutation) = state.queue.iter_mut().find(|m| m.id == entry_id) {
                mutation.synced = true;
            }
        })
    }

    fn rewrite_payload(&self, entry_id: &str, payload: &Value) -> Result<()> {
        self.with_state(|state| {
            if let Some(mutation) = state
                .queue
                .iter_mut()
                .find(|m| m.id == entry_id && !m.synced)
            {
                mutation.payload = payload.clone();
            }
        })
    }

    fn prune_synced(&self) -> Result<()> {
        self.with_state(|state| state.queue.retain(|mutation| !mutation.synced))
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let state = self.state()?;
        Ok(state.meta.get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.with_state(|state| {
            state.meta.insert(key.to_string(), value.to_string());
        })
    }

    fn clear_all(&self) -> Result<()> {
        self.with_state(|state| {
            state.collections.clear();
            state.queue.clear();
            state.meta.clear();
        })
    }

    fn is_data_available(&self) -> Result<bool> {
        let state = self.state()?;
        Ok(state.collections.values().any(|items| !items.is_empty()))
    }
}
