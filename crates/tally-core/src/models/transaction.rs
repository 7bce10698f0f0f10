//! Transaction model

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Collection, FlowKind, Record};

/// A single income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier; `temp_`-prefixed until synced
    pub id: String,
    /// Amount in the account currency, always positive
    pub amount: f64,
    /// Income or expense
    pub kind: FlowKind,
    /// Category this entry belongs to
    pub category_id: String,
    /// Free-form description
    pub description: String,
    /// Booking date
    pub date: NaiveDate,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, merge tie-breaker
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction dated today with a permanent-style id.
    #[must_use]
    pub fn new(
        amount: f64,
        kind: FlowKind,
        category_id: impl Into<String>,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            amount,
            kind,
            category_id: category_id.into(),
            description: description.into(),
            date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed amount: negative for expenses.
    #[must_use]
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            FlowKind::Income => self.amount,
            FlowKind::Expense => -self.amount,
        }
    }
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn natural_cmp(&self, other: &Self) -> Ordering {
        other
            .date
            .cmp(&self.date)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}
