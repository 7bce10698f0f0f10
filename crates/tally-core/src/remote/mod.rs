//! Remote sync client
//!
//! Translates queued mutations into remote writes and reports per-operation
//! outcomes. Nothing in this module panics or propagates errors across the
//! apply boundary: a failed operation is data, not an exception.

mod http;
pub mod rows;

pub use http::HttpRemoteClient;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::models::{Collection, PendingMutation};

/// Errors at the remote boundary.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Invalid remote configuration
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP transport failure
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store rejected the request
    #[error("Remote API error: {0}")]
    Api(String),

    /// Response shape did not match the wire contract
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// No valid session for an authenticated call
    #[error("No valid session")]
    NoSession,
}

/// Per-operation result of applying one mutation remotely.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The mutation this outcome belongs to
    pub mutation: PendingMutation,
    /// Server-assigned id, present for successful creates
    pub new_id: Option<String>,
    /// Failure description; `None` means success
    pub error: Option<String>,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn success(mutation: PendingMutation, new_id: Option<String>) -> Self {
        Self {
            mutation,
            new_id,
            error: None,
        }
    }

    #[must_use]
    pub const fn failure(mutation: PendingMutation, error: String) -> Self {
        Self {
            mutation,
            new_id: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Partition of batch results into successes and failures.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub successful: Vec<ApplyOutcome>,
    pub failed: Vec<ApplyOutcome>,
}

impl BatchReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        if outcome.is_success() {
            self.successful.push(outcome);
        } else {
            self.failed.push(outcome);
        }
    }
}

/// The contract the sync core needs from the remote store.
///
/// Implementations must be cheap to clone (batch members run as spawned
/// tasks, each holding its own handle).
pub trait RemoteBackend: Clone + Send + Sync + 'static {
    /// True when an authenticated session is available.
    fn has_session(&self) -> bool;

    /// Cheap read-only reachability probe. Never errors: any network or
    /// auth failure reads as "unavailable".
    fn probe_availability(&self) -> impl Future<Output = bool> + Send;

    /// Fetch the owner-scoped snapshot of a collection as entity values.
    fn fetch_all(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// Apply a single mutation remotely.
    fn apply(&self, mutation: PendingMutation) -> impl Future<Output = ApplyOutcome> + Send;
}

/// Split mutations into dispatch batches.
///
/// Batches keep FIFO order, hold at most `batch_size` entries, and never
/// contain two mutations targeting the same entity id: members of one batch
/// run concurrently and may complete out of order, so a create and a
/// follow-up on the same entity must land in different batches.
#[must_use]
pub fn plan_batches(
    mutations: Vec<PendingMutation>,
    batch_size: usize,
) -> Vec<Vec<PendingMutation>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<PendingMutation> = Vec::new();
    let mut targets: HashSet<(Collection, String)> = HashSet::new();

    for mutation in mutations {
        let key = mutation
            .target_id()
            .map(|id| (mutation.collection, id.to_string()));
        let conflict = key.as_ref().is_some_and(|k| targets.contains(k));

        if current.len() >= batch_size || conflict {
            batches.push(std::mem::take(&mut current));
            targets.clear();
        }
        if let Some(key) = key {
            targets.insert(key);
        }
        current.push(mutation);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Apply all mutations in planned batches.
///
/// Each batch's operations run concurrently and are fully joined before the
/// next batch starts; a fixed delay separates batches. Individual failures
/// are recorded and never abort the batch.
pub async fn apply_batch<R: RemoteBackend>(
    remote: &R,
    mutations: Vec<PendingMutation>,
    batch_size: usize,
    inter_batch_delay: Duration,
) -> BatchReport {
    let batches = plan_batches(mutations, batch_size);
    let batch_count = batches.len();
    let mut report = BatchReport::default();

    for (index, batch) in batches.into_iter().enumerate() {
        let mut tasks = JoinSet::new();
        for mutation in batch {
            let remote = remote.clone();
            tasks.spawn(async move { remote.apply(mutation).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => tracing::error!(error = %e, "batch task failed to complete"),
            }
        }

        if index + 1 < batch_count {
            tokio::time::sleep(inter_batch_delay).await;
        }
    }

    report
}
