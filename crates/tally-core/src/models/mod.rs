//! Domain models shared by the local cache, the sync engine, and the CLI.

mod category;
mod mutation;
mod savings;
mod transaction;

pub use category::Category;
pub use mutation::{MutationKind, PendingMutation};
pub use savings::{SavingsGoal, SavingsKind, SavingsTransaction};
pub use transaction::Transaction;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved prefix marking identifiers that were generated locally and have
/// not yet been assigned a permanent id by the remote store.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Generate a fresh temporary identifier (time-sortable).
#[must_use]
pub fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7())
}

/// Check whether an identifier is a locally-generated temporary one.
#[must_use]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// The entity collections held in the local cache and mirrored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Transactions,
    Categories,
    SavingsGoals,
    SavingsTransactions,
}

impl Collection {
    /// All collections, in the order they are fetched and merged.
    pub const ALL: [Self; 4] = [
        Self::Categories,
        Self::Transactions,
        Self::SavingsGoals,
        Self::SavingsTransactions,
    ];

    /// Stable storage/wire name for this collection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Categories => "categories",
            Self::SavingsGoals => "savings_goals",
            Self::SavingsTransactions => "savings_transactions",
        }
    }

    /// The collection (and foreign-key field) whose entities reference ids
    /// from this collection, if any. Drives reference rewriting after a
    /// temporary id is reconciled.
    #[must_use]
    pub const fn referenced_by(self) -> Option<(Self, &'static str)> {
        match self {
            Self::Categories => Some((Self::Transactions, "category_id")),
            Self::SavingsGoals => Some((Self::SavingsTransactions, "savings_goal_id")),
            Self::Transactions | Self::SavingsTransactions => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transactions" => Ok(Self::Transactions),
            "categories" => Ok(Self::Categories),
            "savings_goals" => Ok(Self::SavingsGoals),
            "savings_transactions" => Ok(Self::SavingsTransactions),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}

/// Direction of money flow, shared by transactions and categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Income,
    Expense,
}

/// A cacheable, syncable entity.
///
/// Every record carries a string id (permanent or `temp_`-prefixed) and an
/// `updated_at` timestamp used as the merge tie-breaker.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// The collection this record type belongs to.
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn updated_at(&self) -> DateTime<Utc>;

    /// Natural display order within the collection. Defaults to most
    /// recently updated first; date-bearing records override with
    /// date-descending.
    fn natural_cmp(&self, other: &Self) -> Ordering {
        other.updated_at().cmp(&self.updated_at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_are_unique_and_prefixed() {
        let a = temp_id();
        let b = temp_id();
        assert_ne!(a, b);
        assert!(is_temp_id(&a));
        assert!(!is_temp_id("8d7f3c1a-real-id"));
    }

    #[test]
    fn collection_round_trips_through_str() {
        for collection in Collection::ALL {
            let parsed: Collection = collection.as_str().parse().unwrap();
            assert_eq!(parsed, collection);
        }
        assert!("budgets".parse::<Collection>().is_err());
    }

    #[test]
    fn categories_are_referenced_by_transactions() {
        let (collection, field) = Collection::Categories.referenced_by().unwrap();
        assert_eq!(collection, Collection::Transactions);
        assert_eq!(field, "category_id");
        assert!(Collection::Transactions.referenced_by().is_none());
    }
}
