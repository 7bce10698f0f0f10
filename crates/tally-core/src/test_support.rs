//! Shared test doubles for the sync core.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::models::{Collection, MutationKind, PendingMutation};
use crate::remote::{ApplyOutcome, RemoteBackend, RemoteError};

#[derive(Default)]
struct MockState {
    session: AtomicBool,
    available: AtomicBool,
    fail_ids: Mutex<HashSet<String>>,
    rows: Mutex<HashMap<Collection, Vec<Value>>>,
    next_id: AtomicU64,
    probe_calls: AtomicU64,
    apply_calls: AtomicU64,
    probe_delay_ms: AtomicU64,
}

/// In-process remote backend: creates get `srv-N` ids, failures are
/// injected per target entity id.
#[derive(Clone, Default)]
pub(crate) struct MockRemote {
    state: Arc<MockState>,
}

impl MockRemote {
    /// A reachable backend with a valid session.
    pub(crate) fn online() -> Self {
        let remote = Self::default();
        remote.state.session.store(true, Ordering::SeqCst);
        remote.state.available.store(true, Ordering::SeqCst);
        remote
    }

    pub(crate) fn drop_session(&self) {
        self.state.session.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn set_probe_delay_ms(&self, delay: u64) {
        self.state.probe_delay_ms.store(delay, Ordering::SeqCst);
    }

    /// Make every mutation targeting this entity id fail.
    pub(crate) fn fail_target(&self, id: &str) {
        self.state.fail_ids.lock().unwrap().insert(id.to_string());
    }

    pub(crate) fn clear_failures(&self) {
        self.state.fail_ids.lock().unwrap().clear();
    }

    /// Seed the snapshot returned by `fetch_all`, as entity values.
    pub(crate) fn set_rows(&self, collection: Collection, rows: Vec<Value>) {
        self.state.rows.lock().unwrap().insert(collection, rows);
    }

    pub(crate) fn probe_calls(&self) -> u64 {
        self.state.probe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn apply_calls(&self) -> u64 {
        self.state.apply_calls.load(Ordering::SeqCst)
    }
}

impl RemoteBackend for MockRemote {
    fn has_session(&self) -> bool {
        self.state.session.load(Ordering::SeqCst)
    }

    fn probe_availability(&self) -> impl Future<Output = bool> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state.probe_calls.fetch_add(1, Ordering::SeqCst);
            let delay = state.probe_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            state.available.load(Ordering::SeqCst)
        }
    }

    fn fetch_all(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            Ok(state
                .rows
                .lock()
                .unwrap()
                .get(&collection)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn apply(&self, mutation: PendingMutation) -> impl Future<Output = ApplyOutcome> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state.apply_calls.fetch_add(1, Ordering::SeqCst);

            let failing = mutation
                .target_id()
                .is_some_and(|id| state.fail_ids.lock().unwrap().contains(id));
            if failing {
                return ApplyOutcome::failure(mutation, "referenced row missing".into());
            }

            let new_id = match mutation.kind {
                MutationKind::Create => Some(format!(
                    "srv-{}",
                    state.next_id.fetch_add(1, Ordering::SeqCst) + 1
                )),
                MutationKind::Update | MutationKind::Delete => None,
            };
            ApplyOutcome::success(mutation, new_id)
        }
    }
}
