//! Offline mutation queue entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Collection;

/// Kind of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown mutation kind: {other}")),
        }
    }
}

/// A mutation recorded while offline, waiting to be replayed remotely.
///
/// The entry id identifies the queue row itself and is distinct from the
/// entity id inside `payload`. For creates the payload keeps the temporary
/// entity id as correlation data; it is stripped before the remote insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Queue entry identifier
    pub id: String,
    /// Create, update, or delete
    pub kind: MutationKind,
    /// Entity collection this mutation targets
    pub collection: Collection,
    /// Entity payload; for deletes just `{"id": ...}`
    pub payload: Value,
    /// Enqueue time, drives FIFO ordering and retention pruning
    pub timestamp: DateTime<Utc>,
    /// False until the remote store confirmed this mutation
    pub synced: bool,
}

impl PendingMutation {
    fn new(kind: MutationKind, collection: Collection, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            collection,
            payload,
            timestamp: Utc::now(),
            synced: false,
        }
    }

    #[must_use]
    pub fn create(collection: Collection, payload: Value) -> Self {
        Self::new(MutationKind::Create, collection, payload)
    }

    #[must_use]
    pub fn update(collection: Collection, payload: Value) -> Self {
        Self::new(MutationKind::Update, collection, payload)
    }

    #[must_use]
    pub fn delete(collection: Collection, entity_id: &str) -> Self {
        Self::new(
            MutationKind::Delete,
            collection,
            serde_json::json!({ "id": entity_id }),
        )
    }

    /// The entity id this mutation targets, when the payload carries one.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}
