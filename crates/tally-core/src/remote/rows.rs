//! Typed row adapters for the remote store
//!
//! The wire shape (column names, owner column, stringly-typed decimals) is
//! isolated here: one adapter per entity kind, so the rest of the crate only
//! ever sees the domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::RemoteError;
use crate::models::{
    Category, Collection, FlowKind, SavingsGoal, SavingsKind, SavingsTransaction, Transaction,
};

/// Accept decimal amounts as JSON numbers or strings, normalized to `f64`.
fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TransactionRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: String,
    #[serde(deserialize_with = "de_amount")]
    amount: f64,
    #[serde(rename = "type")]
    kind: FlowKind,
    category_id: String,
    #[serde(default)]
    description: String,
    date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn from_entity(entity: Transaction, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            amount: entity.amount,
            kind: entity.kind,
            category_id: entity.category_id,
            description: entity.description,
            date: entity.date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }

    fn into_entity(self) -> Result<Transaction, RemoteError> {
        Ok(Transaction {
            id: require_id(self.id)?,
            amount: self.amount,
            kind: self.kind,
            category_id: self.category_id,
            description: self.description,
            date: self.date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CategoryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: String,
    name: String,
    #[serde(rename = "type")]
    kind: FlowKind,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CategoryRow {
    fn from_entity(entity: Category, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            name: entity.name,
            kind: entity.kind,
            icon: entity.icon,
            color: entity.color,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }

    fn into_entity(self) -> Result<Category, RemoteError> {
        Ok(Category {
            id: require_id(self.id)?,
            name: self.name,
            kind: self.kind,
            icon: self.icon,
            color: self.color,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavingsGoalRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: String,
    name: String,
    #[serde(deserialize_with = "de_amount")]
    target_amount: f64,
    #[serde(deserialize_with = "de_amount")]
    current_amount: f64,
    #[serde(default)]
    deadline: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SavingsGoalRow {
    fn from_entity(entity: SavingsGoal, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            name: entity.name,
            target_amount: entity.target_amount,
            current_amount: entity.current_amount,
            deadline: entity.deadline,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }

    fn into_entity(self) -> Result<SavingsGoal, RemoteError> {
        Ok(SavingsGoal {
            id: require_id(self.id)?,
            name: self.name,
            target_amount: self.target_amount,
            current_amount: self.current_amount,
            deadline: self.deadline,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavingsTransactionRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: String,
    savings_goal_id: String,
    #[serde(deserialize_with = "de_amount")]
    amount: f64,
    #[serde(rename = "type")]
    kind: SavingsKind,
    date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SavingsTransactionRow {
    fn from_entity(entity: SavingsTransaction, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            savings_goal_id: entity.savings_goal_id,
            amount: entity.amount,
            kind: entity.kind,
            date: entity.date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }

    fn into_entity(self) -> Result<SavingsTransaction, RemoteError> {
        Ok(SavingsTransaction {
            id: require_id(self.id)?,
            savings_goal_id: self.savings_goal_id,
            amount: self.amount,
            kind: self.kind,
            date: self.date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn require_id(id: Option<String>) -> Result<String, RemoteError> {
    id.ok_or_else(|| RemoteError::InvalidPayload("row is missing an id".into()))
}

fn de<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::InvalidPayload(e.to_string()))
}

fn ser<T: Serialize>(row: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(row).map_err(|e| RemoteError::InvalidPayload(e.to_string()))
}

/// Convert a domain entity value into an insert/update row for the wire.
///
/// The entity id is dropped (the remote store assigns permanent ids on
/// insert; updates carry the id in the URL filter) and the owner column is
/// stamped.
pub fn entity_to_row(
    collection: Collection,
    mut entity: Value,
    user_id: &str,
) -> Result<Value, RemoteError> {
    if let Some(object) = entity.as_object_mut() {
        object.remove("id");
        object.remove("user_id");
    }
    match collection {
        Collection::Transactions => {
            let typed: Transaction = de(with_placeholder_id(entity))?;
            ser(&TransactionRow::from_entity(typed, user_id))
        }
        Collection::Categories => {
            let typed: Category = de(with_placeholder_id(entity))?;
            ser(&CategoryRow::from_entity(typed, user_id))
        }
        Collection::SavingsGoals => {
            let typed: SavingsGoal = de(with_placeholder_id(entity))?;
            ser(&SavingsGoalRow::from_entity(typed, user_id))
        }
        Collection::SavingsTransactions => {
            let typed: SavingsTransaction = de(with_placeholder_id(entity))?;
            ser(&SavingsTransactionRow::from_entity(typed, user_id))
        }
    }
}

/// Convert a fetched wire row into a domain entity value.
pub fn row_to_entity(collection: Collection, row: Value) -> Result<Value, RemoteError> {
    match collection {
        Collection::Transactions => ser(&de::<TransactionRow>(row)?.into_entity()?),
        Collection::Categories => ser(&de::<CategoryRow>(row)?.into_entity()?),
        Collection::SavingsGoals => ser(&de::<SavingsGoalRow>(row)?.into_entity()?),
        Collection::SavingsTransactions => ser(&de::<SavingsTransactionRow>(row)?.into_entity()?),
    }
}

/// Extract the server-assigned id from an inserted row.
pub fn row_id(row: &Value) -> Result<String, RemoteError> {
    row.get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| RemoteError::InvalidPayload("insert response did not include an id".into()))
}

/// The domain structs require an id; re-add a placeholder so the typed
/// validation can run on payloads that had theirs stripped.
fn with_placeholder_id(mut entity: Value) -> Value {
    if let Some(object) = entity.as_object_mut() {
        object.insert("id".into(), Value::String("pending".into()));
    }
    entity
}
