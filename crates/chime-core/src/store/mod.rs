//! Record storage for reminders and their history records.
//!
//! The store is a flat key-value namespace with read-modify-write
//! semantics: no transactions, every write a whole-record replace. The
//! engine owns the ordering of reads and writes; the store only promises
//! that each individual call either fully succeeds or leaves the previous
//! state intact.

mod config;
mod memory;
mod sqlite;

pub use config::{Config, SnoozeConfig, SnoozePreset};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::reminder::{HistoryRecord, Reminder};

/// Returns `~/.config/chime[-dev]/` based on CHIME_ENV.
///
/// Set CHIME_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CHIME_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("chime-dev")
    } else {
        base_dir.join("chime")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Key-value persistence for reminder records.
///
/// History records share the namespace under `<parent_id>_hist` keys; the
/// dedicated methods keep the two record kinds from being confused at the
/// call sites.
pub trait ReminderStore: Send + Sync {
    /// All reminder records, soft-deleted ones included.
    fn all(&self) -> Result<Vec<Reminder>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Reminder>, StoreError>;

    fn insert(&self, reminder: &Reminder) -> Result<(), StoreError>;

    /// Whole-record replace keyed by id.
    fn update(&self, reminder: &Reminder) -> Result<(), StoreError>;

    fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn history(&self, parent_id: &str) -> Result<Option<HistoryRecord>, StoreError>;

    fn upsert_history(&self, record: &HistoryRecord) -> Result<(), StoreError>;

    /// Removing a history record that does not exist is a no-op.
    fn delete_history(&self, parent_id: &str) -> Result<(), StoreError>;
}
