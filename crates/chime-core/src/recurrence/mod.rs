//! Next-occurrence calculation for reminder series.
//!
//! [`next_occurrence`] is a pure function of the reminder snapshot, the
//! occurrence count to evaluate against the series bound, and a reference
//! instant. It returns the next trigger instant strictly after the
//! reference, or `None` when the series has no more occurrences. It never
//! reads the clock and never touches storage; the reconciliation engine
//! owns all side effects.
//!
//! Policy notes:
//! - Monthly and yearly candidates clamp the desired day to short months
//!   (Jan 31 -> Feb 29 in a leap year); a month is never skipped.
//! - The time-of-day component is reapplied to every candidate with
//!   seconds zeroed.
//! - An invalid repeat configuration (zero-valued interval, weekly series
//!   with no selected days) yields `None`, indistinguishable from a
//!   finished series. [`crate::Reminder::validate`] exists so callers can
//!   reject such configs before they are persisted.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use tracing::debug;

use crate::reminder::{EveryUnit, Reminder, RepeatType, UntilType};

/// Forward-scan window for daily series: one full week plus a day covers
/// any weekday pattern, including a single selected day that is today but
/// already past.
const DAILY_SCAN_DAYS: u64 = 8;

/// Forward-scan window for weekly/custom series: covers the leap-year
/// worst case of a once-yearly weekday alignment.
const WEEKLY_SCAN_DAYS: u64 = 370;

/// Forward-scan window for multi-select day selection.
const MULTI_SELECT_SCAN_DAYS: u64 = 366;

/// Compose a wall-clock date and time into an instant, seconds zeroed.
pub fn instant_at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
    date.and_time(time).and_utc()
}

/// Weekday index of a date, 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Compute the next trigger instant for `reminder` strictly after
/// `reference`, or `None` when the series has ended (or cannot produce
/// occurrences at all).
///
/// `occurrence_count` is caller-supplied rather than read from the record:
/// during reconciliation the engine evaluates the bound against the count
/// *including* the occurrence just completed.
pub fn next_occurrence(
    reminder: &Reminder,
    occurrence_count: u32,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let candidate = raw_candidate(reminder, occurrence_count, reference)?;
    bounded(reminder, occurrence_count, reference, candidate)
}

fn raw_candidate(
    reminder: &Reminder,
    occurrence_count: u32,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match reminder.repeat {
        // One-shot: the single occurrence is the literal anchor, handled
        // by the caller, not by the calculator.
        RepeatType::None => None,
        RepeatType::Daily => {
            let selected: Vec<u8> = if reminder.repeat_days.is_empty() {
                (0..7).collect()
            } else {
                reminder.repeat_days.clone()
            };
            scan_weekdays(&selected, reminder.time, reference, DAILY_SCAN_DAYS)
        }
        RepeatType::Weekly | RepeatType::Custom => {
            if reminder.repeat_days.is_empty() {
                debug!(id = %reminder.id, "weekly series with no selected days");
                return None;
            }
            scan_weekdays(&reminder.repeat_days, reminder.time, reference, WEEKLY_SCAN_DAYS)
        }
        RepeatType::Monthly => {
            let desired = reminder.monthly_day.unwrap_or_else(|| reminder.date.day());
            next_monthly(desired, reminder.time, reference)
        }
        RepeatType::Yearly => {
            // Jumps one year past the reference year unconditionally; this
            // variant does not search for the nearest future anniversary.
            let year = reference.year() + 1;
            let month = reminder.date.month();
            let day = reminder.date.day().min(days_in_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day).map(|d| instant_at(d, reminder.time))
        }
        RepeatType::Every => {
            let interval = reminder.every_interval?;
            if interval.value == 0 {
                debug!(id = %reminder.id, "interval series with zero-valued step");
                return None;
            }
            if reminder.multi_select_enabled {
                multi_select_scan(reminder, occurrence_count, reference)
            } else {
                let step = interval.step();
                let anchor = instant_at(reminder.date, reminder.time);
                if reference < anchor {
                    return Some(anchor);
                }
                // Smallest anchor-aligned instant strictly after the
                // reference.
                let step_ms = step.num_milliseconds();
                let elapsed_ms = (reference - anchor).num_milliseconds();
                let steps = elapsed_ms / step_ms + 1;
                Some(anchor + Duration::milliseconds(steps * step_ms))
            }
        }
    }
}

/// Day-by-day forward scan for daily/weekly patterns.
fn scan_weekdays(
    selected: &[u8],
    time: NaiveTime,
    reference: DateTime<Utc>,
    window_days: u64,
) -> Option<DateTime<Utc>> {
    let start = reference.date_naive();
    for add in 0..window_days {
        let day = start.checked_add_days(Days::new(add))?;
        let candidate = instant_at(day, time);
        if selected.contains(&weekday_index(day)) && candidate > reference {
            return Some(candidate);
        }
    }
    None
}

fn next_monthly(
    desired_day: u32,
    time: NaiveTime,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let year = reference.year();
    let month = reference.month();
    if let Some(candidate) = month_candidate(year, month, desired_day, time) {
        if candidate > reference {
            return Some(candidate);
        }
    }
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    month_candidate(next_year, next_month, desired_day, time)
}

/// Candidate for one month, with the desired day clamped to the month's
/// length rather than skipping the month.
fn month_candidate(
    year: i32,
    month: u32,
    desired_day: u32,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    let day = desired_day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).map(|d| instant_at(d, time))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(28, |d| d.day())
}

/// Multi-select scan for `Every` series: walk forward over selected dates
/// and weekdays, generating interval-stepped occurrences inside each day's
/// `time`..`window_end_time` window, and return the first strictly after
/// the reference.
fn multi_select_scan(
    reminder: &Reminder,
    occurrence_count: u32,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let step = reminder.every_interval?.step();
    let window_end = reminder
        .window_end_time
        .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN));
    let today = reference.date_naive();
    // Under multi-select the count bound is per day: once today's quota is
    // reached, keep scanning so the series can continue on a future day.
    let capped_today = reminder.until == UntilType::Count
        && reminder.until_count.is_some_and(|cap| occurrence_count >= cap);

    for add in 0..MULTI_SELECT_SCAN_DAYS {
        let day = today.checked_add_days(Days::new(add))?;
        if capped_today && day == today {
            continue;
        }
        let on_date = reminder.multi_select_dates.contains(&day);
        let on_day = reminder.multi_select_days.contains(&weekday_index(day));
        if !on_date && !on_day {
            continue;
        }

        let start = instant_at(day, reminder.time);
        let mut end = instant_at(day, window_end);
        if end <= start {
            // Window runs past midnight into the next day.
            end += Duration::days(1);
        }

        let mut occurrence = start;
        while occurrence <= end {
            if occurrence > reference {
                return Some(occurrence);
            }
            occurrence += step;
        }
    }
    None
}

/// Apply the series bound to a raw candidate.
fn bounded(
    reminder: &Reminder,
    occurrence_count: u32,
    reference: DateTime<Utc>,
    candidate: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match reminder.until {
        UntilType::None => Some(candidate),
        UntilType::Count => {
            let Some(cap) = reminder.until_count else {
                return Some(candidate);
            };
            if occurrence_count < cap {
                return Some(candidate);
            }
            // Multi-select interval series count per day; a candidate on a
            // later calendar day starts a fresh quota.
            let future_day = reminder.multi_select_enabled
                && reminder.repeat == RepeatType::Every
                && candidate.date_naive() > reference.date_naive();
            if future_day {
                Some(candidate)
            } else {
                debug!(
                    id = %reminder.id,
                    occurred = occurrence_count,
                    cap,
                    "count cap reached, series ends"
                );
                None
            }
        }
        UntilType::EndsAt => {
            let Some(until_date) = reminder.until_date else {
                return Some(candidate);
            };
            // Minute/hour interval series honor the specific end time;
            // everything else ends at the end of the boundary day.
            let time_bound = reminder.repeat == RepeatType::Every
                && reminder
                    .every_interval
                    .is_some_and(|i| matches!(i.unit, EveryUnit::Minutes | EveryUnit::Hours));
            let boundary = match (time_bound, reminder.until_time) {
                (true, Some(t)) => instant_at(until_date, t),
                _ => end_of_day(until_date),
            };
            if candidate > boundary {
                debug!(id = %reminder.id, %candidate, %boundary, "candidate past end boundary");
                None
            } else {
                Some(candidate)
            }
        }
    }
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| instant_at(date, NaiveTime::MIN))
}
