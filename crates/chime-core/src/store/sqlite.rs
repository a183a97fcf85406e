//! SQLite-backed record store.
//!
//! One `records` table keyed by id, with the serialized record as a JSON
//! payload column. Reminders and history records share the table and are
//! told apart by the `kind` column.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::reminder::{HistoryRecord, Reminder};

use super::{data_dir, ReminderStore};

const KIND_REMINDER: &str = "reminder";
const KIND_HISTORY: &str = "history";

/// SQLite [`ReminderStore`] living under the data dir (`chime.db`).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the store at the default location.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("chime.db"))
    }

    /// Open a store at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn put(&self, id: &str, kind: &str, payload: &str) -> Result<(), StoreError> {
        self.locked().execute(
            "INSERT OR REPLACE INTO records (id, kind, payload) VALUES (?1, ?2, ?3)",
            params![id, kind, payload],
        )?;
        Ok(())
    }

    fn fetch(&self, id: &str, kind: &str) -> Result<Option<String>, StoreError> {
        let payload = self
            .locked()
            .query_row(
                "SELECT payload FROM records WHERE id = ?1 AND kind = ?2",
                params![id, kind],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.locked()
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl ReminderStore for SqliteStore {
    fn all(&self) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.locked();
        let mut stmt =
            conn.prepare("SELECT payload FROM records WHERE kind = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![KIND_REMINDER], |row| row.get::<_, String>(0))?;
        let mut reminders = Vec::new();
        for payload in rows {
            reminders.push(serde_json::from_str(&payload?)?);
        }
        Ok(reminders)
    }

    fn get(&self, id: &str) -> Result<Option<Reminder>, StoreError> {
        match self.fetch(id, KIND_REMINDER)? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, reminder: &Reminder) -> Result<(), StoreError> {
        let payload = serde_json::to_string(reminder)?;
        self.put(&reminder.id, KIND_REMINDER, &payload)
    }

    fn update(&self, reminder: &Reminder) -> Result<(), StoreError> {
        self.insert(reminder)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.remove(id)
    }

    fn history(&self, parent_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
        match self.fetch(&HistoryRecord::id_for(parent_id), KIND_HISTORY)? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn upsert_history(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(record)?;
        self.put(&record.id, KIND_HISTORY, &payload)
    }

    fn delete_history(&self, parent_id: &str) -> Result<(), StoreError> {
        self.remove(&HistoryRecord::id_for(parent_id))
    }
}
