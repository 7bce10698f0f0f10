//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Collection, FlowKind, Record};

/// A spending or income category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier; `temp_`-prefixed until synced
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether entries in this category are income or expenses
    pub kind: FlowKind,
    /// Optional icon name
    #[serde(default)]
    pub icon: Option<String>,
    /// Optional display color (hex)
    #[serde(default)]
    pub color: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, merge tie-breaker
    pub updated_at: DateTime<Utc>,
}

impl Category {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FlowKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            kind,
            icon: None,
            color: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_category_has_no_decoration() {
        let category = Category::new("Groceries", FlowKind::Expense);
        assert_eq!(category.name, "Groceries");
        assert!(category.icon.is_none());
        assert!(category.color.is_none());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let parsed: Category = serde_json::from_value(serde_json::json!({
            "id": "cat-1",
            "name": "Salary",
            "kind": "income",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(parsed.icon.is_none());
        assert_eq!(parsed.kind, FlowKind::Income);
    }
}
