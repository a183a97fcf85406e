//! Occurrence reconciliation and the snooze sub-flow.
//!
//! [`ReminderEngine`] is the only writer of reminder records. Every entry
//! point loads the record, decides the transition, persists the updated
//! record as a whole, and (re)arms or cancels platform triggers. The
//! engine runs single-threaded and to completion per call; cross-process
//! divergence with the native alarm counter is resolved by syncing before
//! deciding, not by locking.
//!
//! ## Completion states
//!
//! ```text
//! ACTIVE_PENDING -> ACTIVE_SNOOZED    (snooze)
//! ACTIVE_PENDING | ACTIVE_SNOOZED -> ACTIVE_PENDING   (done, series continues)
//! ACTIVE_PENDING | ACTIVE_SNOOZED -> SERIES_ENDED     (done, bound reached)
//! ACTIVE_PENDING | ACTIVE_SNOOZED -> COMPLETED_ONE_SHOT
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::alarm::{AlarmPayload, AlarmScheduler, NativeAlarmBridge};
use crate::error::Result;
use crate::recurrence;
use crate::reminder::{HistoryRecord, Priority, Reminder, RepeatType};
use crate::store::ReminderStore;

/// How long to postpone the current occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoozeRequest {
    /// Relative to the moment the snooze is applied.
    Minutes(u32),
    /// Absolute override instant.
    At(DateTime<Utc>),
}

/// Reconciliation engine over an injected store, scheduler and optional
/// native counter bridge.
pub struct ReminderEngine {
    store: Arc<dyn ReminderStore>,
    alarms: Arc<dyn AlarmScheduler>,
    native: Option<Arc<dyn NativeAlarmBridge>>,
}

impl ReminderEngine {
    pub fn new(store: Arc<dyn ReminderStore>, alarms: Arc<dyn AlarmScheduler>) -> Self {
        Self {
            store,
            alarms,
            native: None,
        }
    }

    /// Attach the platform-side counter bridge. Without one, occurrence
    /// counting is local-only and the high-priority sync/suppression
    /// rules never apply.
    pub fn with_native_bridge(mut self, bridge: Arc<dyn NativeAlarmBridge>) -> Self {
        self.native = Some(bridge);
        self
    }

    /// Validate and persist a new reminder, then compute and arm its
    /// first trigger.
    pub fn create(&self, reminder: &Reminder) -> Result<()> {
        self.create_at(reminder, Utc::now())
    }

    pub fn create_at(&self, reminder: &Reminder, now: DateTime<Utc>) -> Result<()> {
        reminder.validate()?;
        self.store.insert(reminder)?;
        self.reschedule_at(&reminder.id, now)
    }

    /// Acknowledge one occurrence of a reminder: done tap, background
    /// delivery, or native auto-fire.
    ///
    /// `should_increment` is the caller's request to count this firing;
    /// the engine may downgrade it (duplicate delivery, native side
    /// already counted). `fired_at` pins the completion instant for
    /// idempotent history recording; callers that cannot supply one get
    /// the last-triggered instant or "now".
    ///
    /// A missing reminder is a logged no-op, not an error.
    pub fn mark_occurrence_done(
        &self,
        id: &str,
        should_increment: bool,
        fired_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mark_occurrence_done_at(id, should_increment, fired_at, Utc::now())
    }

    pub fn mark_occurrence_done_at(
        &self,
        id: &str,
        should_increment: bool,
        fired_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            warn!(id, "completion event for unknown reminder, ignoring");
            return Ok(());
        };

        // A pending snooze override is consumed by any completion,
        // whatever the repeat type.
        let had_snooze = reminder.was_snoozed;
        reminder.snooze_until = None;
        reminder.was_snoozed = false;

        if !reminder.is_repeating() {
            reminder.is_completed = true;
            reminder.is_active = false;
            reminder.next_fire_at = None;
            reminder.last_triggered_at = Some(fired_at.unwrap_or(now));
            self.store.update(&reminder)?;
            self.alarms.cancel_all(id)?;
            info!(id, "one-shot reminder completed");
            return Ok(());
        }

        let mut current = reminder.occurrence_count;

        // The native subsystem keeps firing and counting while this
        // process is down; a larger native count is authoritative.
        if let Some(bridge) = &self.native {
            match bridge.state(id) {
                Ok(Some(state)) if state.actual_trigger_count > current => {
                    debug!(
                        id,
                        local = current,
                        native = state.actual_trigger_count,
                        "adopting native occurrence count"
                    );
                    current = state.actual_trigger_count;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(id, %err, "native state query failed, keeping local count");
                }
            }
        }

        let completed_at = fired_at.or(reminder.last_triggered_at).unwrap_or(now);
        let mut history = self
            .store
            .history(id)?
            .unwrap_or_else(|| HistoryRecord::new(id));
        let duplicate = history.contains(completed_at)
            || reminder.completion_history.contains(&completed_at);

        let mut increment = should_increment;
        if increment && duplicate {
            // At-least-once delivery: this exact completion was already
            // recorded, so the count moved with the first delivery.
            debug!(id, %completed_at, "duplicate completion event, not incrementing");
            increment = false;
        }
        if increment && had_snooze && reminder.priority == Priority::High && self.native.is_some() {
            // The native alarm path counted this firing when it fired and
            // the sync above folded that in.
            debug!(id, "snooze completion already counted natively, not incrementing");
            increment = false;
        }

        let new_count = if increment { current + 1 } else { current };
        reminder.occurrence_count = new_count;

        let next = recurrence::next_occurrence(&reminder, new_count, now);

        history.record(completed_at);

        match next {
            Some(next_at) => {
                self.store.upsert_history(&history)?;

                // Multi-select interval series count occurrences per day:
                // rolling onto a new calendar day starts the quota over.
                if reminder.multi_select_enabled
                    && reminder.repeat == RepeatType::Every
                    && completed_at.date_naive() != next_at.date_naive()
                {
                    debug!(id, "series rolled to a new day, occurrence count reset");
                    reminder.occurrence_count = 0;
                }

                reminder.next_fire_at = Some(next_at);
                reminder.last_triggered_at = Some(completed_at);
                reminder.is_active = true;
                reminder.is_completed = false;
                reminder.is_paused = false;
                reminder.is_expired = false;
                self.store.update(&reminder)?;

                if let Some(bridge) = &self.native {
                    if let Err(err) = bridge.set_count(id, reminder.occurrence_count) {
                        warn!(id, %err, "failed to push occurrence count to native side");
                    }
                }

                self.alarms.arm(id, next_at, &AlarmPayload::from(&reminder))?;
                info!(id, %next_at, "occurrence recorded, next trigger armed");
            }
            None => {
                // Series ended: fold the shadow history into the main
                // record, then retire the shadow.
                let mut merged = reminder.completion_history.clone();
                for &t in &history.completion_history {
                    if !merged.contains(&t) {
                        merged.push(t);
                    }
                }
                merged.sort_unstable();
                reminder.completion_history = merged;
                self.store.delete_history(id)?;

                reminder.is_completed = true;
                reminder.is_active = false;
                reminder.next_fire_at = None;
                reminder.last_triggered_at = Some(completed_at);
                self.store.update(&reminder)?;

                self.alarms.cancel_all(id)?;
                if let Some(bridge) = &self.native {
                    if let Err(err) = bridge.clear_metadata(id) {
                        warn!(id, %err, "failed to clear native metadata");
                    }
                }
                info!(
                    id,
                    occurrences = reminder.completion_history.len(),
                    "series ended"
                );
            }
        }

        Ok(())
    }

    /// Postpone the current occurrence without advancing the recurrence.
    ///
    /// The replacement trigger is armed under the same reminder id so the
    /// later completion finds the original record.
    pub fn snooze(&self, id: &str, request: SnoozeRequest) -> Result<()> {
        self.snooze_at(id, request, Utc::now())
    }

    pub fn snooze_at(&self, id: &str, request: SnoozeRequest, now: DateTime<Utc>) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            warn!(id, "snooze for unknown reminder, ignoring");
            return Ok(());
        };

        self.alarms.cancel_all(id)?;

        let until = match request {
            SnoozeRequest::Minutes(minutes) => now + Duration::minutes(i64::from(minutes)),
            SnoozeRequest::At(at) => at,
        };
        reminder.snooze_until = Some(until);
        reminder.was_snoozed = true;
        reminder.is_expired = false;
        reminder.last_triggered_at = Some(now);
        self.store.update(&reminder)?;

        self.alarms.arm(id, until, &AlarmPayload::from(&reminder))?;
        info!(id, %until, "occurrence snoozed");
        Ok(())
    }

    /// A dismissed (not acknowledged) delivery expires a one-shot
    /// low-priority reminder; anything else is left untouched for the
    /// next delivery attempt.
    pub fn handle_dismiss(&self, id: &str) -> Result<()> {
        self.handle_dismiss_at(id, Utc::now())
    }

    pub fn handle_dismiss_at(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(());
        };
        if reminder.repeat == RepeatType::None && reminder.priority == Priority::Low {
            debug!(id, "dismissed one-shot low-priority reminder marked expired");
            reminder.is_expired = true;
            reminder.last_triggered_at = Some(now);
            self.store.update(&reminder)?;
        }
        Ok(())
    }

    /// Recompute and re-arm the next trigger for a reminder, honoring a
    /// pending snooze override. Used on creation, restore and startup
    /// refresh.
    pub fn reschedule(&self, id: &str) -> Result<()> {
        self.reschedule_at(id, Utc::now())
    }

    pub fn reschedule_at(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            warn!(id, "reschedule for unknown reminder, ignoring");
            return Ok(());
        };
        if reminder.is_completed || reminder.is_paused || reminder.is_deleted {
            self.alarms.cancel_all(id)?;
            return Ok(());
        }

        let target = if reminder.was_snoozed {
            reminder.snooze_until
        } else if reminder.is_repeating() {
            recurrence::next_occurrence(&reminder, reminder.occurrence_count, now)
        } else {
            let anchor = reminder.anchor();
            (anchor > now).then_some(anchor)
        };

        match target {
            Some(at) => {
                reminder.next_fire_at = Some(at);
                reminder.is_active = true;
                self.store.update(&reminder)?;
                self.alarms.arm(id, at, &AlarmPayload::from(&reminder))?;
            }
            None => {
                if !reminder.is_repeating() && !reminder.was_snoozed {
                    debug!(id, "one-shot anchor already passed, marking expired");
                    reminder.is_expired = true;
                    reminder.next_fire_at = None;
                    self.store.update(&reminder)?;
                }
                self.alarms.cancel_all(id)?;
            }
        }
        Ok(())
    }

    /// Pause delivery without touching the series state.
    pub fn pause(&self, id: &str) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(());
        };
        if !reminder.is_paused {
            reminder.is_paused = true;
            self.alarms.cancel_all(id)?;
            self.store.update(&reminder)?;
            info!(id, "reminder paused");
        }
        Ok(())
    }

    pub fn resume(&self, id: &str) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(());
        };
        if reminder.is_paused {
            reminder.is_paused = false;
            self.store.update(&reminder)?;
            self.reschedule(id)?;
            info!(id, "reminder resumed");
        }
        Ok(())
    }

    /// Soft delete: triggers cancelled, record kept for restore.
    pub fn soft_delete(&self, id: &str) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(());
        };
        self.alarms.cancel_all(id)?;
        reminder.is_deleted = true;
        reminder.is_active = false;
        self.store.update(&reminder)?;
        info!(id, "reminder soft-deleted");
        Ok(())
    }

    pub fn restore(&self, id: &str) -> Result<()> {
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(());
        };
        if reminder.is_deleted {
            reminder.is_deleted = false;
            reminder.is_active = !reminder.is_completed;
            self.store.update(&reminder)?;
            if !reminder.is_completed {
                self.reschedule(id)?;
            }
            info!(id, "reminder restored");
        }
        Ok(())
    }

    /// Permanently remove a reminder, its history record, its platform
    /// triggers, and (best-effort) its native-side metadata.
    pub fn purge(&self, id: &str) -> Result<()> {
        self.alarms.cancel_all(id)?;
        self.store.delete(id)?;
        self.store.delete_history(id)?;
        if let Some(bridge) = &self.native {
            if let Err(err) = bridge.clear_metadata(id) {
                warn!(id, %err, "failed to clear native metadata");
            }
        }
        info!(id, "reminder purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::NativeReminderState;
    use crate::error::{AlarmError, CoreError, StoreError};
    use crate::reminder::{EveryInterval, EveryUnit, UntilType};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use std::sync::Mutex;

    // -- test doubles ------------------------------------------------

    #[derive(Default)]
    struct RecordingScheduler {
        armed: Mutex<Vec<(String, DateTime<Utc>)>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl RecordingScheduler {
        fn armed(&self) -> Vec<(String, DateTime<Utc>)> {
            self.armed.lock().unwrap().clone()
        }

        fn cancelled(&self) -> Vec<String> {
            self.cancelled.lock().unwrap().clone()
        }
    }

    impl AlarmScheduler for RecordingScheduler {
        fn arm(
            &self,
            id: &str,
            at: DateTime<Utc>,
            _payload: &AlarmPayload,
        ) -> Result<(), AlarmError> {
            self.armed.lock().unwrap().push((id.to_string(), at));
            Ok(())
        }

        fn cancel_all(&self, id: &str) -> Result<(), AlarmError> {
            self.cancelled.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubBridge {
        state: Option<NativeReminderState>,
        fail: bool,
        pushed: Mutex<Vec<(String, u32)>>,
        cleared: Mutex<Vec<String>>,
    }

    impl NativeAlarmBridge for StubBridge {
        fn state(&self, _id: &str) -> Result<Option<NativeReminderState>, AlarmError> {
            if self.fail {
                return Err(AlarmError::Backend("bridge down".into()));
            }
            Ok(self.state)
        }

        fn set_count(&self, id: &str, count: u32) -> Result<(), AlarmError> {
            if self.fail {
                return Err(AlarmError::Backend("bridge down".into()));
            }
            self.pushed.lock().unwrap().push((id.to_string(), count));
            Ok(())
        }

        fn clear_metadata(&self, id: &str) -> Result<(), AlarmError> {
            if self.fail {
                return Err(AlarmError::Backend("bridge down".into()));
            }
            self.cleared.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    struct FailingStore;

    impl ReminderStore for FailingStore {
        fn all(&self) -> Result<Vec<Reminder>, StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn get(&self, _id: &str) -> Result<Option<Reminder>, StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn insert(&self, _reminder: &Reminder) -> Result<(), StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn update(&self, _reminder: &Reminder) -> Result<(), StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn history(&self, _parent_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn upsert_history(&self, _record: &HistoryRecord) -> Result<(), StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
        fn delete_history(&self, _parent_id: &str) -> Result<(), StoreError> {
            Err(StoreError::QueryFailed("store down".into()))
        }
    }

    // -- fixtures ----------------------------------------------------

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn daily_reminder(id: &str) -> Reminder {
        let mut r = Reminder::new(
            "daily",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        r.id = id.to_string();
        r.repeat = RepeatType::Daily;
        r
    }

    fn every_reminder(id: &str, minutes: u32) -> Reminder {
        let mut r = daily_reminder(id);
        r.repeat = RepeatType::Every;
        r.every_interval = Some(EveryInterval {
            value: minutes,
            unit: EveryUnit::Minutes,
        });
        r
    }

    fn one_shot(id: &str) -> Reminder {
        let mut r = daily_reminder(id);
        r.repeat = RepeatType::None;
        r
    }

    struct Rig {
        store: Arc<MemoryStore>,
        alarms: Arc<RecordingScheduler>,
        engine: ReminderEngine,
    }

    fn rig() -> Rig {
        let store = Arc::new(MemoryStore::new());
        let alarms = Arc::new(RecordingScheduler::default());
        let engine = ReminderEngine::new(store.clone(), alarms.clone());
        Rig {
            store,
            alarms,
            engine,
        }
    }

    fn rig_with_bridge(bridge: StubBridge) -> (Rig, Arc<StubBridge>) {
        let store = Arc::new(MemoryStore::new());
        let alarms = Arc::new(RecordingScheduler::default());
        let bridge = Arc::new(bridge);
        let engine =
            ReminderEngine::new(store.clone(), alarms.clone()).with_native_bridge(bridge.clone());
        (
            Rig {
                store,
                alarms,
                engine,
            },
            bridge,
        )
    }

    // -- completion: one-shot ---------------------------------------

    #[test]
    fn unknown_reminder_completion_is_a_noop() {
        let rig = rig();
        rig.engine
            .mark_occurrence_done_at("ghost", true, None, at(2024, 3, 4, 10, 0))
            .unwrap();
        assert!(rig.alarms.armed().is_empty());
        assert!(rig.alarms.cancelled().is_empty());
    }

    #[test]
    fn one_shot_completion_marks_completed_and_cancels() {
        let rig = rig();
        let r = one_shot("r1");
        rig.store.insert(&r).unwrap();

        let now = at(2024, 3, 4, 10, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, None, now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_completed);
        assert!(!saved.is_active);
        assert_eq!(saved.next_fire_at, None);
        assert_eq!(saved.last_triggered_at, Some(now));
        assert_eq!(rig.alarms.cancelled(), vec!["r1".to_string()]);
    }

    #[test]
    fn snoozed_one_shot_completion_clears_snooze_fields() {
        let rig = rig();
        let mut r = one_shot("r1");
        r.was_snoozed = true;
        r.snooze_until = Some(at(2024, 3, 4, 10, 5));
        rig.store.insert(&r).unwrap();

        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 10, 10))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_completed);
        assert!(!saved.was_snoozed);
        assert_eq!(saved.snooze_until, None);
    }

    // -- completion: repeating --------------------------------------

    #[test]
    fn repeating_completion_advances_and_arms() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        let now = at(2024, 3, 4, 10, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, None, now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
        assert_eq!(saved.next_fire_at, Some(at(2024, 3, 5, 9, 0)));
        assert!(saved.is_active);
        assert!(!saved.is_completed);
        assert_eq!(
            rig.alarms.armed(),
            vec![("r1".to_string(), at(2024, 3, 5, 9, 0))]
        );

        let history = rig.store.history("r1").unwrap().unwrap();
        assert_eq!(history.completion_history, vec![now]);
    }

    #[test]
    fn completion_is_idempotent_for_same_fired_instant() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        let fired = at(2024, 3, 4, 9, 0);
        let now = at(2024, 3, 4, 10, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, Some(fired), now)
            .unwrap();
        rig.engine
            .mark_occurrence_done_at("r1", true, Some(fired), now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
        let history = rig.store.history("r1").unwrap().unwrap();
        assert_eq!(history.completion_history, vec![fired]);
    }

    #[test]
    fn duplicate_delivery_without_fired_instant_uses_last_triggered() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        // First delivery records "now" as the completion instant; the
        // racing second delivery falls back to last_triggered_at and is
        // recognized as the same occurrence.
        let now = at(2024, 3, 4, 10, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, None, now)
            .unwrap();
        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 10, 1))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
    }

    #[test]
    fn count_bound_series_ends_after_three_completions() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.until = UntilType::Count;
        r.until_count = Some(3);
        rig.store.insert(&r).unwrap();

        for day in 4..7 {
            let fired = at(2024, 3, day, 9, 0);
            rig.engine
                .mark_occurrence_done_at("r1", true, Some(fired), fired)
                .unwrap();
        }

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_completed);
        assert!(!saved.is_active);
        assert_eq!(saved.occurrence_count, 3);
        assert_eq!(saved.next_fire_at, None);
        assert_eq!(
            saved.completion_history,
            vec![
                at(2024, 3, 4, 9, 0),
                at(2024, 3, 5, 9, 0),
                at(2024, 3, 6, 9, 0)
            ]
        );
        // Shadow record retired with the series.
        assert!(rig.store.history("r1").unwrap().is_none());
        assert!(rig.alarms.cancelled().contains(&"r1".to_string()));
    }

    #[test]
    fn completion_after_series_end_stays_terminal() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.until = UntilType::Count;
        r.until_count = Some(1);
        rig.store.insert(&r).unwrap();

        let fired = at(2024, 3, 4, 9, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, Some(fired), fired)
            .unwrap();
        // Late duplicate after the series already ended.
        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 9, 5))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_completed);
        assert_eq!(saved.occurrence_count, 1);
        assert_eq!(saved.completion_history, vec![fired]);
    }

    #[test]
    fn series_end_merges_shadow_history_sorted() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.until = UntilType::Count;
        r.until_count = Some(3);
        r.occurrence_count = 2;
        rig.store.insert(&r).unwrap();

        let mut shadow = HistoryRecord::new("r1");
        shadow.record(at(2024, 3, 2, 9, 0));
        shadow.record(at(2024, 3, 1, 9, 0));
        rig.store.upsert_history(&shadow).unwrap();

        let fired = at(2024, 3, 4, 9, 0);
        rig.engine
            .mark_occurrence_done_at("r1", true, Some(fired), fired)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_completed);
        assert_eq!(
            saved.completion_history,
            vec![at(2024, 3, 1, 9, 0), at(2024, 3, 2, 9, 0), fired]
        );
        assert!(rig.store.history("r1").unwrap().is_none());
    }

    // -- native synchronization -------------------------------------

    #[test]
    fn high_priority_snooze_done_does_not_double_count() {
        let (rig, bridge) = rig_with_bridge(StubBridge {
            state: Some(NativeReminderState {
                actual_trigger_count: 1,
            }),
            ..StubBridge::default()
        });
        let mut r = every_reminder("r1", 15);
        r.priority = Priority::High;
        r.was_snoozed = true;
        r.snooze_until = Some(at(2024, 1, 1, 10, 5));
        r.until = UntilType::Count;
        r.until_count = Some(3);
        rig.store.insert(&r).unwrap();

        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 1, 1, 10, 10))
            .unwrap();

        // Native already counted the firing during sync; incrementing on
        // top of it would record the occurrence twice.
        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
        assert_eq!(bridge.pushed.lock().unwrap().last(), Some(&("r1".to_string(), 1)));
    }

    #[test]
    fn medium_priority_snooze_done_increments_normally() {
        let (rig, _bridge) = rig_with_bridge(StubBridge::default());
        let mut r = every_reminder("r1", 15);
        r.priority = Priority::Medium;
        r.was_snoozed = true;
        r.snooze_until = Some(at(2024, 1, 1, 10, 5));
        r.until = UntilType::Count;
        r.until_count = Some(3);
        rig.store.insert(&r).unwrap();

        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 1, 1, 10, 10))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
    }

    #[test]
    fn high_priority_snooze_done_without_bridge_increments() {
        // No native module on this platform: local counting is the only
        // authority, so the increment must not be suppressed.
        let rig = rig();
        let mut r = every_reminder("r1", 15);
        r.priority = Priority::High;
        r.was_snoozed = true;
        rig.store.insert(&r).unwrap();

        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 1, 1, 10, 10))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
    }

    #[test]
    fn native_sync_failure_falls_back_to_local_count() {
        let (rig, _bridge) = rig_with_bridge(StubBridge {
            fail: true,
            ..StubBridge::default()
        });
        rig.store.insert(&daily_reminder("r1")).unwrap();

        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 10, 0))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
        assert!(saved.is_active);
    }

    #[test]
    fn native_count_adopted_when_ahead() {
        let (rig, _bridge) = rig_with_bridge(StubBridge {
            state: Some(NativeReminderState {
                actual_trigger_count: 4,
            }),
            ..StubBridge::default()
        });
        let mut r = daily_reminder("r1");
        r.occurrence_count = 2;
        rig.store.insert(&r).unwrap();

        // Plain delivery (not a snooze completion): sync adopts 4, then
        // the requested increment applies on top.
        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 10, 0))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 5);
    }

    // -- multi-select day switch ------------------------------------

    #[test]
    fn day_switch_resets_multi_select_count() {
        let (rig, bridge) = rig_with_bridge(StubBridge::default());
        let mut r = every_reminder("r1", 30);
        r.multi_select_enabled = true;
        r.multi_select_days = (0..7).collect();
        r.time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        r.window_end_time = Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        r.occurrence_count = 2;
        rig.store.insert(&r).unwrap();

        // Past today's window: the next occurrence lands tomorrow, which
        // flips the per-day counter back to zero.
        let now = at(2024, 3, 4, 10, 30);
        rig.engine
            .mark_occurrence_done_at("r1", true, None, now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 0);
        assert_eq!(saved.next_fire_at, Some(at(2024, 3, 5, 9, 0)));
        assert_eq!(bridge.pushed.lock().unwrap().last(), Some(&("r1".to_string(), 0)));
    }

    #[test]
    fn same_day_multi_select_completion_keeps_count() {
        let rig = rig();
        let mut r = every_reminder("r1", 30);
        r.multi_select_enabled = true;
        r.multi_select_days = (0..7).collect();
        r.window_end_time = Some(NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        rig.store.insert(&r).unwrap();

        let now = at(2024, 3, 4, 9, 10);
        rig.engine
            .mark_occurrence_done_at("r1", true, None, now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 1);
        assert_eq!(saved.next_fire_at, Some(at(2024, 3, 4, 9, 30)));
    }

    // -- failure propagation ----------------------------------------

    #[test]
    fn store_failure_propagates() {
        let engine = ReminderEngine::new(
            Arc::new(FailingStore),
            Arc::new(RecordingScheduler::default()),
        );
        let err = engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 10, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));
    }

    // -- snooze ------------------------------------------------------

    #[test]
    fn snooze_sets_override_and_rearms_same_id() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        let now = at(2024, 3, 4, 9, 0);
        rig.engine
            .snooze_at("r1", SnoozeRequest::Minutes(10), now)
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.snooze_until, Some(at(2024, 3, 4, 9, 10)));
        assert!(saved.was_snoozed);
        assert_eq!(saved.last_triggered_at, Some(now));
        assert_eq!(rig.alarms.cancelled(), vec!["r1".to_string()]);
        assert_eq!(
            rig.alarms.armed(),
            vec![("r1".to_string(), at(2024, 3, 4, 9, 10))]
        );
    }

    #[test]
    fn snooze_leaves_recurrence_untouched() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.occurrence_count = 2;
        r.next_fire_at = Some(at(2024, 3, 5, 9, 0));
        rig.store.insert(&r).unwrap();

        rig.engine
            .snooze_at("r1", SnoozeRequest::Minutes(5), at(2024, 3, 4, 9, 0))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.occurrence_count, 2);
        assert_eq!(saved.repeat, RepeatType::Daily);
        assert_eq!(saved.next_fire_at, Some(at(2024, 3, 5, 9, 0)));
    }

    #[test]
    fn snooze_accepts_absolute_instant() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        let target = at(2024, 3, 4, 14, 0);
        rig.engine
            .snooze_at("r1", SnoozeRequest::At(target), at(2024, 3, 4, 9, 0))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.snooze_until, Some(target));
    }

    #[test]
    fn snooze_then_done_consumes_override() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        rig.engine
            .snooze_at("r1", SnoozeRequest::Minutes(10), at(2024, 3, 4, 9, 0))
            .unwrap();
        rig.engine
            .mark_occurrence_done_at("r1", true, None, at(2024, 3, 4, 9, 15))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(!saved.was_snoozed);
        assert_eq!(saved.snooze_until, None);
        assert_eq!(saved.occurrence_count, 1);
        assert_eq!(saved.next_fire_at, Some(at(2024, 3, 5, 9, 0)));
    }

    // -- dismiss -----------------------------------------------------

    #[test]
    fn dismiss_expires_low_priority_one_shot() {
        let rig = rig();
        let mut r = one_shot("r1");
        r.priority = Priority::Low;
        rig.store.insert(&r).unwrap();

        rig.engine
            .handle_dismiss_at("r1", at(2024, 3, 4, 10, 0))
            .unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_expired);
        assert!(!saved.is_completed);
    }

    #[test]
    fn dismiss_leaves_other_reminders_untouched() {
        let rig = rig();
        rig.store.insert(&one_shot("r1")).unwrap(); // medium priority
        rig.store.insert(&daily_reminder("r2")).unwrap();

        rig.engine
            .handle_dismiss_at("r1", at(2024, 3, 4, 10, 0))
            .unwrap();
        rig.engine
            .handle_dismiss_at("r2", at(2024, 3, 4, 10, 0))
            .unwrap();

        assert!(!rig.store.get("r1").unwrap().unwrap().is_expired);
        assert!(!rig.store.get("r2").unwrap().unwrap().is_expired);
    }

    // -- lifecycle ---------------------------------------------------

    #[test]
    fn create_validates_and_arms_first_trigger() {
        let rig = rig();
        let mut r = every_reminder("r1", 15);
        r.date = NaiveDate::from_ymd_opt(2100, 1, 1).unwrap();
        rig.engine.create_at(&r, at(2024, 3, 4, 9, 0)).unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert_eq!(saved.next_fire_at, Some(at(2100, 1, 1, 9, 0)));
        assert_eq!(rig.alarms.armed().len(), 1);
    }

    #[test]
    fn create_rejects_invalid_config() {
        let rig = rig();
        let r = every_reminder("r1", 0);
        let err = rig.engine.create_at(&r, at(2024, 3, 4, 9, 0)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(rig.store.get("r1").unwrap().is_none());
    }

    #[test]
    fn reschedule_honors_pending_snooze() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.was_snoozed = true;
        r.snooze_until = Some(at(2024, 3, 4, 9, 10));
        rig.store.insert(&r).unwrap();

        rig.engine.reschedule_at("r1", at(2024, 3, 4, 9, 0)).unwrap();

        assert_eq!(
            rig.alarms.armed(),
            vec![("r1".to_string(), at(2024, 3, 4, 9, 10))]
        );
    }

    #[test]
    fn reschedule_expires_past_one_shot() {
        let rig = rig();
        let r = one_shot("r1"); // anchored 2024-01-01 09:00
        rig.store.insert(&r).unwrap();

        rig.engine.reschedule_at("r1", at(2024, 3, 4, 9, 0)).unwrap();

        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_expired);
        assert!(rig.alarms.armed().is_empty());
    }

    #[test]
    fn reschedule_skips_paused_and_completed() {
        let rig = rig();
        let mut r = daily_reminder("r1");
        r.is_paused = true;
        rig.store.insert(&r).unwrap();

        rig.engine.reschedule_at("r1", at(2024, 3, 4, 9, 0)).unwrap();

        assert!(rig.alarms.armed().is_empty());
        assert_eq!(rig.alarms.cancelled(), vec!["r1".to_string()]);
    }

    #[test]
    fn pause_cancels_and_resume_rearms() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        rig.engine.pause("r1").unwrap();
        assert!(rig.store.get("r1").unwrap().unwrap().is_paused);
        assert_eq!(rig.alarms.cancelled(), vec!["r1".to_string()]);

        rig.engine.resume("r1").unwrap();
        assert!(!rig.store.get("r1").unwrap().unwrap().is_paused);
        assert_eq!(rig.alarms.armed().len(), 1);
    }

    #[test]
    fn soft_delete_and_restore_round_trip() {
        let rig = rig();
        rig.store.insert(&daily_reminder("r1")).unwrap();

        rig.engine.soft_delete("r1").unwrap();
        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(saved.is_deleted);
        assert!(!saved.is_active);

        rig.engine.restore("r1").unwrap();
        let saved = rig.store.get("r1").unwrap().unwrap();
        assert!(!saved.is_deleted);
        assert!(saved.is_active);
        assert!(!rig.alarms.armed().is_empty());
    }

    #[test]
    fn purge_removes_record_history_and_native_metadata() {
        let (rig, bridge) = rig_with_bridge(StubBridge::default());
        rig.store.insert(&daily_reminder("r1")).unwrap();
        rig.store.upsert_history(&HistoryRecord::new("r1")).unwrap();

        rig.engine.purge("r1").unwrap();

        assert!(rig.store.get("r1").unwrap().is_none());
        assert!(rig.store.history("r1").unwrap().is_none());
        assert_eq!(*bridge.cleared.lock().unwrap(), vec!["r1".to_string()]);
    }
}
