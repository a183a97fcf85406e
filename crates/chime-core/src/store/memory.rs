//! In-memory store for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::reminder::{HistoryRecord, Reminder};

use super::ReminderStore;

#[derive(Default)]
struct State {
    reminders: HashMap<String, Reminder>,
    histories: HashMap<String, HistoryRecord>,
}

/// `HashMap`-backed [`ReminderStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another thread panicked mid-write;
        // the map itself is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReminderStore for MemoryStore {
    fn all(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(self.locked().reminders.values().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<Option<Reminder>, StoreError> {
        Ok(self.locked().reminders.get(id).cloned())
    }

    fn insert(&self, reminder: &Reminder) -> Result<(), StoreError> {
        self.locked()
            .reminders
            .insert(reminder.id.clone(), reminder.clone());
        Ok(())
    }

    fn update(&self, reminder: &Reminder) -> Result<(), StoreError> {
        self.insert(reminder)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.locked().reminders.remove(id);
        Ok(())
    }

    fn history(&self, parent_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
        let key = HistoryRecord::id_for(parent_id);
        Ok(self.locked().histories.get(&key).cloned())
    }

    fn upsert_history(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        self.locked()
            .histories
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn delete_history(&self, parent_id: &str) -> Result<(), StoreError> {
        let key = HistoryRecord::id_for(parent_id);
        self.locked().histories.remove(&key);
        Ok(())
    }
}
