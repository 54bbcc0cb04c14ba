//! Schedule calculators.
//!
//! Pure functions from (definition, now) to the notification descriptors
//! that should be pending. They never talk to the platform; the
//! [`NotificationScheduler`](crate::notification::NotificationScheduler)
//! applies the future-only rule again when it submits them.

mod expiry;
mod reminder;

pub use expiry::*;
pub use reminder::*;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use thiserror::Error;

/// Schedule calculation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Reminder {reminder_id} needs {expected} intake times but has {found}")]
    MissingIntakeTimes {
        reminder_id: i64,
        expected: u32,
        found: usize,
    },

    #[error("Reminder {reminder_id} has no intakes configured")]
    NoIntakes { reminder_id: i64 },

    #[error("Invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// The instant at which `date` shows `hour:minute` on local clocks.
///
/// Returns `None` for wall-clock times skipped by a DST transition; repeated
/// times resolve to the earlier instant.
pub(crate) fn local_instant<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `date` moved forward by `days` calendar days.
pub(crate) fn add_days(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
}
