//! Merging of local cache and remote snapshot
//!
//! Called once per successful remote fetch. Pure: the result depends only on
//! the two inputs.

use std::collections::HashMap;

use crate::models::{is_temp_id, Record};

/// Combine the local cache with a freshly fetched remote snapshot.
///
/// Rules, in order:
/// - entities with a temporary id survive verbatim (pending creations);
/// - when the same permanent id exists on both sides, the later `updated_at`
///   wins, remote on ties;
/// - local permanent entities absent from the snapshot are retained (the
///   queue reconciles them eventually);
/// - remote-only entities are taken as-is.
///
/// The result has no duplicate ids and is sorted in the record's natural
/// order.
pub fn merge<T: Record>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut remote_by_id: HashMap<String, T> = remote
        .into_iter()
        .map(|item| (item.id().to_string(), item))
        .collect();

    let mut result = Vec::with_capacity(local.len() + remote_by_id.len());
    let mut temporaries = Vec::new();

    for item in local {
        if is_temp_id(item.id()) {
            temporaries.push(item);
            continue;
        }

        match remote_by_id.remove(item.id()) {
            Some(remote_item) => {
                if item.updated_at() > remote_item.updated_at() {
                    result.push(item);
                } else {
                    result.push(remote_item);
                }
            }
            None => result.push(item),
        }
    }

    result.extend(remote_by_id.into_values());
    result.extend(temporaries);
    result.sort_by(|a, b| a.natural_cmp(b));
    result
}
