//! Storage tier strategy interface
//!
//! Both tiers speak JSON values so the facade can fall from one to the other
//! without retyping; typed access lives on [`super::LocalStore`].

use serde_json::Value;

use crate::error::Result;
use crate::models::{Collection, PendingMutation};

/// One persistence tier of the local cache.
///
/// Implemented by the structured SQLite tier and the flat file tier. All
/// operations are keyed by the entity's `id` field inside the value.
pub trait StorageTier {
    /// Read every cached entity of a collection.
    fn get_all(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Replace the whole collection with the given entities.
    fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()>;

    /// Read a single entity by id.
    fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Insert or replace a single entity, keyed by its `id` field.
    fn save_one(&self, collection: Collection, item: &Value) -> Result<()>;

    /// Remove a single entity; absent ids are not an error.
    fn delete_one(&self, collection: Collection, id: &str) -> Result<()>;

    /// Re-key an entity from `old_id` to `new_id`, updating the id inside
    /// the stored value as well. No-op when `old_id` is absent.
    fn swap_id(&self, collection: Collection, old_id: &str, new_id: &str) -> Result<()>;

    /// Append a mutation to the offline queue.
    fn enqueue(&self, mutation: &PendingMutation) -> Result<()>;

    /// All queue entries with `synced == false`, in enqueue order.
    fn pending_mutations(&self) -> Result<Vec<PendingMutation>>;

    /// Flag a queue entry as confirmed by the remote store.
    fn mark_synced(&self, entry_id: &str) -> Result<()>;

    /// Replace the payload of a still-pending queue entry.
    fn rewrite_payload(&self, entry_id: &str, payload: &Value) -> Result<()>;

    /// Drop every queue entry with `synced == true`.
    fn prune_synced(&self) -> Result<()>;

    /// Read a metadata value (e.g. the last-sync timestamp).
    fn meta(&self, key: &str) -> Result<Option<String>>;

    /// Write a metadata value.
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    /// Wipe every collection, the queue, and all metadata.
    fn clear_all(&self) -> Result<()>;

    /// True when any collection holds at least one entity.
    fn is_data_available(&self) -> Result<bool>;
}

/// Extract the required `id` field from an entity value.
pub(crate) fn value_id(item: &Value) -> Result<&str> {
    item.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::error::Error::InvalidInput("entity is missing an id".into()))
}
