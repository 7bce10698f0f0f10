//! Structured cache tier backed by SQLite

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;

use super::migrations;
use super::tier::{value_id, StorageTier};
use crate::error::{Error, Result};
use crate::models::{Collection, MutationKind, PendingMutation};

/// How long SQLite may wait on a locked database before the open (or any
/// later statement) gives up and the facade degrades to the flat tier.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of [`StorageTier`].
///
/// Each collection is a document table (`id`, `data` JSON, `updated_at`);
/// the queue and metadata get their own tables.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) the cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("cache connection poisoned".into()))
    }
}

fn item_updated_at(item: &Value) -> String {
    item.get("updated_at")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_mutation_row(
    (id, kind, collection, payload, timestamp, synced): (String, String, String, String, String, i64),
) -> Result<PendingMutation> {
    Ok(PendingMutation {
        id,
        kind: kind.parse::<MutationKind>().map_err(Error::Database)?,
        collection: collection.parse::<Collection>().map_err(Error::Database)?,
        payload: serde_json::from_str(&payload)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| Error::Database(format!("bad queue timestamp: {e}")))?
            .with_timezone(&Utc),
        synced: synced != 0,
    })
}

impl StorageTier for SqliteStore {
    fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT data FROM {} ORDER BY updated_at DESC",
            collection.as_str()
        ))?;

        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.iter()
            .map(|data| serde_json::from_str(data).map_err(Error::from))
            .collect()
    }

    fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(&format!("DELETE FROM {}", collection.as_str()), [])?;
        for item in items {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, data, updated_at) VALUES (?, ?, ?)",
                    collection.as_str()
                ),
                params![value_id(item)?, item.to_string(), item_updated_at(item)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT data FROM {} WHERE id = ?", collection.as_str()),
            params![id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_one(&self, collection: Collection, item: &Value) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, data, updated_at) VALUES (?, ?, ?)",
                collection.as_str()
            ),
            params![value_id(item)?, item.to_string(), item_updated_at(item)],
        )?;
        Ok(())
    }

    fn delete_one(&self, collection: Collection, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", collection.as_str()),
            params![id],
        )?;
        Ok(())
    }

    fn swap_id(&self, collection: Collection, old_id: &str, new_id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = match tx.query_row(
            &format!("SELECT data FROM {} WHERE id = ?", collection.as_str()),
            params![old_id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(data) => data,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut item: Value = serde_json::from_str(&existing)?;
        item["id"] = Value::String(new_id.to_string());

        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?", collection.as_str()),
            params![old_id],
        )?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, data, updated_at) VALUES (?, ?, ?)",
                collection.as_str()
            ),
            params![new_id, item.to_string(), item_updated_at(&item)],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn enqueue(&self, mutation: &PendingMutation) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pending_mutations (id, kind, collection, payload, timestamp, synced)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                mutation.id,
                mutation.kind.as_str(),
                mutation.collection.as_str(),
                mutation.payload.to_string(),
                mutation.timestamp.to_rfc3339(),
                i32::from(mutation.synced)
            ],
        )?;
        Ok(())
    }

    fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, collection, payload, timestamp, synced
             FROM pending_mutations
             WHERE synced = 0
             ORDER BY timestamp ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(parse_mutation_row).collect()
    }

    fn mark_synced(&self, entry_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pending_mutations SET synced = 1 WHERE id = ?",
            params![entry_id],
        )?;
        Ok(())
    }

    fn rewrite_payload(&self, entry_id: &str, payload: &Value) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pending_mutations SET payload = ? WHERE id = ? AND synced = 0",
            params![payload.to_string(), entry_id],
        )?;
        Ok(())
    }

    fn prune_synced(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM pending_mutations WHERE synced = 1", [])?;
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT value FROM sync_meta WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for collection in Collection::ALL {
            tx.execute(&format!("DELETE FROM {}", collection.as_str()), [])?;
        }
        tx.execute("DELETE FROM pending_mutations", [])?;
        tx.execute("DELETE FROM sync_meta", [])?;

        tx.commit()?;
        Ok(())
    }

    fn is_data_available(&self) -> Result<bool> {
        let conn = self.conn()?;
        for collection in Collection::ALL {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", collection.as_str()),
                [],
                |row| row.get(0),
            )?;
            if count > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
