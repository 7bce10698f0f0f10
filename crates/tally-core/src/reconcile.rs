//! Identifier reconciliation
//!
//! After a queued create is confirmed remotely, the entity cached under the
//! temporary id is re-keyed to the server-assigned permanent id, and every
//! local reference to the temporary id (cached children and still-pending
//! queue payloads) is rewritten to match.

use serde_json::Value;

use crate::error::Result;
use crate::models::Collection;
use crate::store::LocalStore;

/// Replace every local reference to `temp_id` with `permanent_id`.
///
/// Idempotent: when no entity is cached under `temp_id` (already reconciled,
/// or never cached) this is a no-op.
pub fn reconcile(
    store: &LocalStore,
    collection: Collection,
    temp_id: &str,
    permanent_id: &str,
) -> Result<()> {
    if store.get_one_value(collection, temp_id)?.is_none() {
        return Ok(());
    }

    tracing::debug!(%collection, temp_id, permanent_id, "reconciling temporary id");
    store.swap_id(collection, temp_id, permanent_id)?;
    rewrite_references(store, collection, temp_id, permanent_id)
}

/// Point foreign keys in dependent collections at the permanent id, both in
/// cached entities and in payloads of mutations still waiting to sync, so a
/// retried create carries a permanent parent.
fn rewrite_references(
    store: &LocalStore,
    collection: Collection,
    temp_id: &str,
    permanent_id: &str,
) -> Result<()> {
    let Some((child, field)) = collection.referenced_by() else {
        return Ok(());
    };

    for mut item in store.get_all_values(child)? {
        if item.get(field).and_then(Value::as_str) == Some(temp_id) {
            item[field] = Value::String(permanent_id.to_string());
            store.save_one_value(child, &item)?;
        }
    }

    for mutation in store.pending_mutations()? {
        if mutation.collection == child
            && mutation.payload.get(field).and_then(Value::as_str) == Some(temp_id)
        {
            let mut payload = mutation.payload.clone();
            payload[field] = Value::String(permanent_id.to_string());
            store.rewrite_payload(&mutation.id, &payload)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{temp_id, Category, FlowKind, PendingMutation, Record, Transaction};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, LocalStore) {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let (_dir, store) = setup();
        let mut category = Category::new("Groceries", FlowKind::Expense);
        let pending_id = temp_id();
        category.set_id(pending_id.clone());
        store.save_one(&category).unwrap();

        reconcile(&store, Collection::Categories, &pending_id, "cat-1").unwrap();
        reconcile(&store, Collection::Categories, &pending_id, "cat-1").unwrap();

        let all: Vec<Category> = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "cat-1");
        assert!(store
            .get_one::<Category>(&pending_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn reconcile_of_uncached_id_is_a_no_op() {
        let (_dir, store) = setup();
        reconcile(&store, Collection::Categories, "temp_gone", "cat-1").unwrap();
        assert!(store.get_one::<Category>("cat-1").unwrap().is_none());
    }

    #[test]
    fn cached_references_are_rewritten() {
        let (_dir, store) = setup();
        let pending_id = temp_id();

        let mut category = Category::new("Transport", FlowKind::Expense);
        category.set_id(pending_id.clone());
        store.save_one(&category).unwrap();

        let tx = Transaction::new(
            8.0,
            FlowKind::Expense,
            pending_id.clone(),
            "bus",
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        store.save_one(&tx).unwrap();

        reconcile(&store, Collection::Categories, &pending_id, "cat-9").unwrap();

        let loaded: Transaction = store.get_one(&tx.id).unwrap().unwrap();
        assert_eq!(loaded.category_id, "cat-9");
    }

    #[test]
    fn queued_payload_references_are_rewritten() {
        let (_dir, store) = setup();
        let pending_id = temp_id();

        let mut category = Category::new("Transport", FlowKind::Expense);
        category.set_id(pending_id.clone());
        store.save_one(&category).unwrap();

        let tx_payload = serde_json::json!({
            "id": temp_id(),
            "category_id": pending_id,
            "amount": 8.0,
        });
        let entry_id = store
            .enqueue(PendingMutation::create(
                Collection::Transactions,
                tx_payload,
            ))
            .unwrap();

        reconcile(&store, Collection::Categories, &pending_id, "cat-9").unwrap();

        let pending = store.pending_mutations().unwrap();
        let entry = pending.iter().find(|m| m.id == entry_id).unwrap();
        assert_eq!(entry.payload["category_id"], "cat-9");
    }
}
