//! Savings goal models

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Collection, Record};

/// A savings target the user is working toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    /// Unique identifier; `temp_`-prefixed until synced
    pub id: String,
    /// Display name
    pub name: String,
    /// Target amount to save
    pub target_amount: f64,
    /// Amount saved so far
    pub current_amount: f64,
    /// Optional target date
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, merge tie-breaker
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    #[must_use]
    pub fn new(name: impl Into<String>, target_amount: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            target_amount,
            current_amount: 0.0,
            deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fraction of the target reached, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }
        (self.current_amount / self.target_amount).clamp(0.0, 1.0)
    }
}

impl Record for SavingsGoal {
    const COLLECTION: Collection = Collection::SavingsGoals;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Direction of a savings movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsKind {
    Deposit,
    Withdrawal,
}

/// A deposit into or withdrawal from a savings goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsTransaction {
    /// Unique identifier; `temp_`-prefixed until synced
    pub id: String,
    /// Goal this movement belongs to
    pub savings_goal_id: String,
    /// Amount moved, always positive
    pub amount: f64,
    /// Deposit or withdrawal
    pub kind: SavingsKind,
    /// Booking date
    pub date: NaiveDate,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, merge tie-breaker
    pub updated_at: DateTime<Utc>,
}

impl SavingsTransaction {
    #[must_use]
    pub fn new(
        savings_goal_id: impl Into<String>,
        amount: f64,
        kind: SavingsKind,
        date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            savings_goal_id: savings_goal_id.into(),
            amount,
            kind,
            date,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for SavingsTransaction {
    const COLLECTION: Collection = Collection::SavingsTransactions;

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
