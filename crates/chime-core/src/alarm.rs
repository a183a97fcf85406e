//! Platform alarm collaborator contracts.
//!
//! The engine never talks to a notification system directly; it goes
//! through [`AlarmScheduler`] (arm/cancel a trigger for a reminder id) and,
//! when the platform has one, [`NativeAlarmBridge`] (the platform-side
//! occurrence counter that keeps firing while the host process is down).
//! The bridge is an optional capability: engines built without one run
//! with local counting authority only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AlarmError;
use crate::reminder::{Priority, Reminder};

/// Payload forwarded to the platform when a trigger fires. Presentation
/// details (channel, full-screen behavior, sound) are the platform's
/// concern; the engine only carries them through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default)]
    pub ringer_sound: Option<String>,
}

impl From<&Reminder> for AlarmPayload {
    fn from(reminder: &Reminder) -> Self {
        Self {
            title: reminder.title.clone(),
            body: reminder.description.clone(),
            priority: reminder.priority,
            ringer_sound: reminder.ringer_sound.clone(),
        }
    }
}

/// Platform trigger registration.
///
/// `arm` is idempotent per id: re-arming replaces any prior trigger for
/// that id. Failures propagate to the caller; a reminder that could not be
/// armed is a failed operation, not a silently dropped one.
pub trait AlarmScheduler: Send + Sync {
    fn arm(&self, id: &str, at: DateTime<Utc>, payload: &AlarmPayload) -> Result<(), AlarmError>;

    fn cancel_all(&self, id: &str) -> Result<(), AlarmError>;
}

/// Counter state the native alarm subsystem holds for a reminder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NativeReminderState {
    /// How many times the native side has actually fired this reminder.
    pub actual_trigger_count: u32,
}

/// Platform-side occurrence counter, meaningful for high-priority
/// reminders armed natively. Every call is best-effort from the engine's
/// perspective: errors are logged at the call site and reconciliation
/// proceeds on local state.
pub trait NativeAlarmBridge: Send + Sync {
    fn state(&self, id: &str) -> Result<Option<NativeReminderState>, AlarmError>;

    fn set_count(&self, id: &str, count: u32) -> Result<(), AlarmError>;

    fn clear_metadata(&self, id: &str) -> Result<(), AlarmError>;
}

/// Scheduler for headless environments (CLI, tests) where no platform
/// trigger service exists. Logs what would have been armed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScheduler;

impl AlarmScheduler for NullScheduler {
    fn arm(&self, id: &str, at: DateTime<Utc>, payload: &AlarmPayload) -> Result<(), AlarmError> {
        debug!(id, %at, title = %payload.title, "no platform scheduler; trigger not armed");
        Ok(())
    }

    fn cancel_all(&self, id: &str) -> Result<(), AlarmError> {
        debug!(id, "no platform scheduler; nothing to cancel");
        Ok(())
    }
}
