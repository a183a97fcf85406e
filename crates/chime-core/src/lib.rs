//! # Chime Core Library
//!
//! This library provides the core business logic for the Chime reminder
//! application. It implements a CLI-first philosophy where all operations
//! are available via a standalone CLI binary, with any GUI shell being a
//! thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Recurrence Calculator**: pure date math mapping a reminder's repeat
//!   policy, occurrence count, and a reference instant to the next trigger
//!   instant (or series end)
//! - **Reminder Engine**: the only writer of reminder records; reconciles
//!   completion events (done, snoozed, auto-delivered) against storage,
//!   the platform scheduler, and an optional native occurrence counter
//! - **Storage**: SQLite-based record storage and TOML-based configuration
//! - **Collaborator contracts**: platform alarm scheduler and native
//!   counter bridge traits, injected into the engine
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: completion state machine and snooze sub-flow
//! - [`next_occurrence`]: recurrence calculation
//! - [`SqliteStore`] / [`MemoryStore`]: record stores
//! - [`Config`]: application configuration management

pub mod alarm;
pub mod engine;
pub mod error;
pub mod recurrence;
pub mod reminder;
pub mod store;

pub use alarm::{
    AlarmPayload, AlarmScheduler, NativeAlarmBridge, NativeReminderState, NullScheduler,
};
pub use engine::{ReminderEngine, SnoozeRequest};
pub use error::{AlarmError, ConfigError, CoreError, Result, StoreError, ValidationError};
pub use recurrence::{instant_at, next_occurrence, weekday_index};
pub use reminder::{
    EveryInterval, EveryUnit, HistoryRecord, Priority, Reminder, RepeatType, UntilType,
};
pub use store::{data_dir, Config, MemoryStore, ReminderStore, SnoozePreset, SqliteStore};
