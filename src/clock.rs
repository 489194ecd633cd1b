//! Time source and the calendar arithmetic built on it
//!
//! All day boundaries are evaluated in a fixed `+08:00` offset regardless of
//! the host's time zone.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};

/// Offset of the calendar the contexts are scheduled in, in seconds east of UTC
pub const SCHEDULE_OFFSET_SECS: i32 = 8 * 3600;

/// Format of the dedup marker stored in the context document
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Calendar date of `now` in the schedule offset
pub fn schedule_date(now: DateTime<Utc>) -> NaiveDate {
    (now.naive_utc() + TimeDelta::seconds(i64::from(SCHEDULE_OFFSET_SECS))).date()
}

/// Day of month of the day after `today`.
///
/// Uses real calendar arithmetic, so the 31st of a month maps to 1.
pub fn tomorrow_day(today: NaiveDate) -> u32 {
    today.succ_opt().map(|d| d.day()).unwrap_or(1)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
