//! Reminder data model.
//!
//! A [`Reminder`] is the persisted entity: anchor date/time, repeat policy,
//! series bound, lifecycle flags and the cached next-fire instant. A
//! [`HistoryRecord`] shadows an active repeating series and collects its
//! completion instants until the series ends, at which point the engine
//! merges them back into the main record.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Suffix appended to a reminder id to form its history record id.
pub const HISTORY_ID_SUFFIX: &str = "_hist";

/// Delivery priority. `High` reminders ride the native alarm path, which
/// counts occurrences on its own; the engine treats that counter as
/// authoritative during reconciliation. Other priorities are counted
/// engine-side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Repeat policy of a reminder series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    /// Single occurrence at the anchor date/time.
    None,
    /// Every day, optionally restricted to selected weekdays.
    Daily,
    /// Selected weekdays each week.
    Weekly,
    /// Same as weekly; kept as a distinct variant for round-tripping
    /// records that were saved with it.
    Custom,
    /// Once a month on a desired day-of-month (clamped to short months).
    Monthly,
    /// Once a year on the anchor month/day.
    Yearly,
    /// Fixed interval stepping from the anchor instant.
    Every,
}

/// Unit for [`EveryInterval`] stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EveryUnit {
    Minutes,
    Hours,
    Days,
}

/// Interval for `RepeatType::Every` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveryInterval {
    pub value: u32,
    pub unit: EveryUnit,
}

impl EveryInterval {
    /// The interval as a chrono duration. Zero-valued intervals are
    /// invalid and rejected by the calculator before this is called.
    pub fn step(&self) -> chrono::Duration {
        let v = i64::from(self.value);
        match self.unit {
            EveryUnit::Minutes => chrono::Duration::minutes(v),
            EveryUnit::Hours => chrono::Duration::hours(v),
            EveryUnit::Days => chrono::Duration::days(v),
        }
    }
}

/// How a repeating series terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UntilType {
    /// Open-ended series.
    #[default]
    None,
    /// Series ends at a calendar boundary (`until_date`/`until_time`).
    EndsAt,
    /// Series ends after `until_count` occurrences.
    Count,
}

/// The persisted reminder entity.
///
/// Weekday fields (`repeat_days`, `multi_select_days`) hold indices with
/// 0 = Sunday .. 6 = Saturday. All instants are UTC; the anchor `date` and
/// `time` are wall-clock values the calculator composes into instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Anchor date for the series (or the single occurrence).
    pub date: NaiveDate,
    /// Wall-clock time applied to every computed occurrence.
    pub time: NaiveTime,
    pub priority: Priority,
    pub repeat: RepeatType,
    #[serde(default)]
    pub repeat_days: Vec<u8>,
    #[serde(default)]
    pub every_interval: Option<EveryInterval>,
    /// Desired day-of-month for monthly series; falls back to `date`'s day.
    #[serde(default)]
    pub monthly_day: Option<u32>,

    #[serde(default)]
    pub until: UntilType,
    #[serde(default)]
    pub until_date: Option<NaiveDate>,
    #[serde(default)]
    pub until_time: Option<NaiveTime>,
    #[serde(default)]
    pub until_count: Option<u32>,
    /// Occurrences already completed/fired for this series. Under
    /// multi-select this counts occurrences-per-day and is reset by the
    /// engine when the series rolls over to a new calendar day.
    #[serde(default)]
    pub occurrence_count: u32,

    /// Multi-select trigger-day source for `Every` series: explicit dates
    /// and/or weekdays, with occurrences generated inside the daily window
    /// `time`..`window_end_time`.
    #[serde(default)]
    pub multi_select_enabled: bool,
    #[serde(default)]
    pub multi_select_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub multi_select_days: Vec<u8>,
    #[serde(default)]
    pub window_end_time: Option<NaiveTime>,

    pub is_active: bool,
    pub is_completed: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub is_deleted: bool,

    /// Pending snooze override. While `was_snoozed` is true this instant,
    /// not the computed recurrence, is the next-fire source.
    #[serde(default)]
    pub snooze_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub was_snoozed: bool,

    /// Cached next trigger instant; recomputed on every reconciliation.
    #[serde(default)]
    pub next_fire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    /// Completion instants of an ended series, merged from the history
    /// record when the series terminated. Empty while the series is live.
    #[serde(default)]
    pub completion_history: Vec<DateTime<Utc>>,

    /// Sound identifier forwarded opaquely to the alarm payload.
    #[serde(default)]
    pub ringer_sound: Option<String>,
}

impl Reminder {
    /// Create a one-shot, medium-priority reminder at the given anchor.
    pub fn new(title: impl Into<String>, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            date,
            time,
            priority: Priority::Medium,
            repeat: RepeatType::None,
            repeat_days: Vec::new(),
            every_interval: None,
            monthly_day: None,
            until: UntilType::None,
            until_date: None,
            until_time: None,
            until_count: None,
            occurrence_count: 0,
            multi_select_enabled: false,
            multi_select_dates: Vec::new(),
            multi_select_days: Vec::new(),
            window_end_time: None,
            is_active: true,
            is_completed: false,
            is_paused: false,
            is_expired: false,
            is_deleted: false,
            snooze_until: None,
            was_snoozed: false,
            next_fire_at: None,
            last_triggered_at: None,
            created_at: Utc::now(),
            completion_history: Vec::new(),
            ringer_sound: None,
        }
    }

    /// The anchor instant: `date` at `time`, seconds zeroed.
    pub fn anchor(&self) -> DateTime<Utc> {
        crate::recurrence::instant_at(self.date, self.time)
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat != RepeatType::None
    }

    /// Check the repeat configuration for values the calculator would
    /// silently treat as "series ended". Callers creating reminders should
    /// reject these up front.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.repeat {
            RepeatType::Every => match &self.every_interval {
                None => Err(ValidationError::MissingField {
                    field: "every_interval".into(),
                    repeat: "every".into(),
                }),
                Some(interval) if interval.value == 0 => Err(ValidationError::InvalidValue {
                    field: "every_interval.value".into(),
                    message: "must be greater than zero".into(),
                }),
                Some(_) => Ok(()),
            },
            RepeatType::Weekly | RepeatType::Custom => {
                if self.repeat_days.is_empty() {
                    Err(ValidationError::MissingField {
                        field: "repeat_days".into(),
                        repeat: "weekly".into(),
                    })
                } else {
                    Ok(())
                }
            }
            RepeatType::Monthly => match self.monthly_day {
                Some(day) if !(1..=31).contains(&day) => Err(ValidationError::InvalidValue {
                    field: "monthly_day".into(),
                    message: "must be between 1 and 31".into(),
                }),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

/// Shadow record holding completion instants for a still-active repeating
/// series. Keyed as `<parent_id>_hist` in the same store namespace; owned
/// exclusively by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub parent_id: String,
    /// Ordered, deduplicated completion instants.
    #[serde(default)]
    pub completion_history: Vec<DateTime<Utc>>,
}

impl HistoryRecord {
    pub fn new(parent_id: impl Into<String>) -> Self {
        let parent_id = parent_id.into();
        Self {
            id: Self::id_for(&parent_id),
            parent_id,
            completion_history: Vec::new(),
        }
    }

    /// The store key for a parent reminder's history record.
    pub fn id_for(parent_id: &str) -> String {
        format!("{parent_id}{HISTORY_ID_SUFFIX}")
    }

    /// Whether this exact instant has already been recorded.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.completion_history.contains(&at)
    }

    /// Record a completion instant. Re-recording an already-present
    /// instant is a silent no-op; returns whether the record changed.
    pub fn record(&mut self, at: DateTime<Utc>) -> bool {
        if self.contains(at) {
            return false;
        }
        self.completion_history.push(at);
        self.completion_history.sort_unstable();
        true
    }
}
