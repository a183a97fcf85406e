//! Reminder management commands for CLI.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Subcommand;

use chime_core::{
    Config, EveryInterval, EveryUnit, NullScheduler, Priority, Reminder, ReminderEngine,
    ReminderStore, RepeatType, SnoozeRequest, SqliteStore, UntilType,
};

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Create a new reminder
    Add {
        /// Reminder title
        title: String,
        /// Anchor date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Wall-clock time (HH:MM)
        #[arg(long)]
        time: String,
        /// Repeat policy: none, daily, weekly, custom, monthly, yearly, every
        #[arg(long, default_value = "none")]
        repeat: String,
        /// Comma-separated weekday indices, 0=Sunday .. 6=Saturday
        #[arg(long)]
        days: Option<String>,
        /// Interval value for --repeat every
        #[arg(long)]
        every: Option<u32>,
        /// Interval unit for --repeat every: minutes, hours, days
        #[arg(long, default_value = "minutes")]
        unit: String,
        /// Desired day-of-month for monthly series
        #[arg(long)]
        monthly_day: Option<u32>,
        /// Priority: low, medium, high
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
        /// End the series after this many occurrences
        #[arg(long)]
        until_count: Option<u32>,
        /// End the series at this date (YYYY-MM-DD)
        #[arg(long)]
        until_date: Option<String>,
        /// End time on the boundary day (HH:MM), minute/hour intervals only
        #[arg(long)]
        until_time: Option<String>,
        /// Sound identifier forwarded to the platform
        #[arg(long)]
        ringer: Option<String>,
    },
    /// List reminders
    List {
        /// Include completed and soft-deleted reminders
        #[arg(long)]
        all: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one reminder in full
    Show {
        /// Reminder ID
        id: String,
    },
    /// Acknowledge the current occurrence
    Done {
        /// Reminder ID
        id: String,
        /// Record the occurrence without counting it
        #[arg(long)]
        no_increment: bool,
        /// Instant the trigger actually fired (RFC 3339)
        #[arg(long)]
        fired_at: Option<String>,
    },
    /// Postpone the current occurrence
    Snooze {
        /// Reminder ID
        id: String,
        /// Minutes from now (defaults to the configured snooze)
        #[arg(long)]
        minutes: Option<u32>,
        /// Absolute override instant (RFC 3339)
        #[arg(long)]
        until: Option<String>,
    },
    /// Record a dismissed (unacknowledged) delivery
    Dismiss {
        /// Reminder ID
        id: String,
    },
    /// Pause delivery
    Pause {
        /// Reminder ID
        id: String,
    },
    /// Resume delivery
    Resume {
        /// Reminder ID
        id: String,
    },
    /// Soft-delete a reminder
    Delete {
        /// Reminder ID
        id: String,
    },
    /// Restore a soft-deleted reminder
    Restore {
        /// Reminder ID
        id: String,
    },
    /// Permanently remove a reminder and its history
    Purge {
        /// Reminder ID
        id: String,
    },
    /// Recompute and re-arm triggers
    Reschedule {
        /// Reminder ID; all active reminders when omitted
        id: Option<String>,
    },
}

pub fn run(action: ReminderAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open()?);
    let engine = ReminderEngine::new(store.clone(), Arc::new(NullScheduler));

    match action {
        ReminderAction::Add {
            title,
            date,
            time,
            repeat,
            days,
            every,
            unit,
            monthly_day,
            priority,
            description,
            until_count,
            until_date,
            until_time,
            ringer,
        } => {
            let mut reminder = Reminder::new(title, parse_date(&date)?, parse_time(&time)?);
            reminder.repeat = parse_repeat(&repeat)?;
            reminder.priority = parse_priority(&priority)?;
            if let Some(days) = days {
                reminder.repeat_days = parse_days(&days)?;
            }
            if let Some(value) = every {
                reminder.every_interval = Some(EveryInterval {
                    value,
                    unit: parse_unit(&unit)?,
                });
            }
            reminder.monthly_day = monthly_day;
            if let Some(description) = description {
                reminder.description = description;
            }
            if let Some(count) = until_count {
                reminder.until = UntilType::Count;
                reminder.until_count = Some(count);
            } else if let Some(date) = until_date {
                reminder.until = UntilType::EndsAt;
                reminder.until_date = Some(parse_date(&date)?);
                reminder.until_time = until_time.as_deref().map(parse_time).transpose()?;
            }
            reminder.ringer_sound = ringer;

            engine.create(&reminder)?;
            println!("Reminder created: {}", reminder.id);
            if let Some(saved) = store.get(&reminder.id)? {
                if let Some(next) = saved.next_fire_at {
                    println!("Next trigger: {next}");
                }
            }
        }
        ReminderAction::List { all, json } => {
            let mut reminders = store.all()?;
            if !all {
                reminders.retain(|r| !r.is_deleted && !r.is_completed);
            }
            reminders.sort_by(|a, b| a.next_fire_at.cmp(&b.next_fire_at));
            if json {
                println!("{}", serde_json::to_string_pretty(&reminders)?);
            } else if reminders.is_empty() {
                println!("No reminders.");
            } else {
                for r in &reminders {
                    println!("{}", summary_line(r));
                }
            }
        }
        ReminderAction::Show { id } => match store.get(&id)? {
            Some(reminder) => println!("{}", serde_json::to_string_pretty(&reminder)?),
            None => println!("No reminder with id {id}"),
        },
        ReminderAction::Done {
            id,
            no_increment,
            fired_at,
        } => {
            let fired_at = fired_at.as_deref().map(parse_instant).transpose()?;
            engine.mark_occurrence_done(&id, !no_increment, fired_at)?;
            report_state(&*store, &id)?;
        }
        ReminderAction::Snooze { id, minutes, until } => {
            let request = match (minutes, until) {
                (_, Some(until)) => SnoozeRequest::At(parse_instant(&until)?),
                (Some(minutes), None) => SnoozeRequest::Minutes(minutes),
                (None, None) => SnoozeRequest::Minutes(Config::load()?.snooze.default_minutes),
            };
            engine.snooze(&id, request)?;
            if let Some(saved) = store.get(&id)? {
                if let Some(until) = saved.snooze_until {
                    println!("Snoozed until {until}");
                }
            }
        }
        ReminderAction::Dismiss { id } => {
            engine.handle_dismiss(&id)?;
            report_state(&*store, &id)?;
        }
        ReminderAction::Pause { id } => {
            engine.pause(&id)?;
            println!("Paused {id}");
        }
        ReminderAction::Resume { id } => {
            engine.resume(&id)?;
            println!("Resumed {id}");
        }
        ReminderAction::Delete { id } => {
            engine.soft_delete(&id)?;
            println!("Deleted {id} (restorable)");
        }
        ReminderAction::Restore { id } => {
            engine.restore(&id)?;
            println!("Restored {id}");
        }
        ReminderAction::Purge { id } => {
            engine.purge(&id)?;
            println!("Purged {id}");
        }
        ReminderAction::Reschedule { id } => match id {
            Some(id) => {
                engine.reschedule(&id)?;
                report_state(&*store, &id)?;
            }
            None => {
                let mut count = 0usize;
                for reminder in store.all()? {
                    if !reminder.is_completed && !reminder.is_deleted && !reminder.is_paused {
                        engine.reschedule(&reminder.id)?;
                        count += 1;
                    }
                }
                println!("Rescheduled {count} reminder(s)");
            }
        },
    }
    Ok(())
}

fn summary_line(r: &Reminder) -> String {
    let state = if r.is_completed {
        "done"
    } else if r.is_deleted {
        "deleted"
    } else if r.is_paused {
        "paused"
    } else if r.was_snoozed {
        "snoozed"
    } else if r.is_expired {
        "expired"
    } else {
        "active"
    };
    let next = r
        .next_fire_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into());
    format!(
        "{}  [{:8}] {:?}/{:?}  next: {}  {}",
        r.id, state, r.repeat, r.priority, next, r.title
    )
}

fn report_state(store: &dyn ReminderStore, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    match store.get(id)? {
        Some(r) => {
            if r.is_completed {
                println!(
                    "{id}: completed ({} occurrence(s) recorded)",
                    r.completion_history.len().max(r.occurrence_count as usize)
                );
            } else if let Some(next) = r.next_fire_at {
                println!("{id}: next trigger {next} (occurrence {})", r.occurrence_count);
            } else {
                println!("{id}: no pending trigger");
            }
        }
        None => println!("No reminder with id {id}"),
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

fn parse_time(s: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    Ok(NaiveTime::parse_from_str(s, "%H:%M")?)
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_days(s: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    s.split(',')
        .map(|part| -> Result<u8, Box<dyn std::error::Error>> {
            let day: u8 = part.trim().parse()?;
            if day > 6 {
                return Err(format!("weekday index out of range: {day}").into());
            }
            Ok(day)
        })
        .collect()
}

fn parse_repeat(s: &str) -> Result<RepeatType, Box<dyn std::error::Error>> {
    match s {
        "none" => Ok(RepeatType::None),
        "daily" => Ok(RepeatType::Daily),
        "weekly" => Ok(RepeatType::Weekly),
        "custom" => Ok(RepeatType::Custom),
        "monthly" => Ok(RepeatType::Monthly),
        "yearly" => Ok(RepeatType::Yearly),
        "every" => Ok(RepeatType::Every),
        other => Err(format!("unknown repeat type: {other}").into()),
    }
}

fn parse_priority(s: &str) -> Result<Priority, Box<dyn std::error::Error>> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(format!("unknown priority: {other}").into()),
    }
}

fn parse_unit(s: &str) -> Result<EveryUnit, Box<dyn std::error::Error>> {
    match s {
        "minutes" => Ok(EveryUnit::Minutes),
        "hours" => Ok(EveryUnit::Hours),
        "days" => Ok(EveryUnit::Days),
        other => Err(format!("unknown interval unit: {other}").into()),
    }
}
