//! `days:hours:minutes[:seconds]` timestamps
//!
//! The day field counts days of the subject's lifetime rather than calendar
//! dates, so intervals can be computed without exposing real dates.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Minutes in one day
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// A parsed timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStamp {
    pub days: i32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeStamp {
    #[must_use]
    pub const fn new(days: i32, hours: u32, minutes: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds: 0,
        }
    }

    /// Minutes since day zero, ignoring seconds
    #[must_use]
    pub fn total_minutes(&self) -> i64 {
        i64::from(self.days) * MINUTES_PER_DAY + i64::from(self.hours) * 60 + i64::from(self.minutes)
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.days, self.hours, self.minutes)?;
        if self.seconds > 0 {
            write!(f, ":{:02}", self.seconds)?;
        }
        Ok(())
    }
}

/// Parse `days:hours:minutes[:seconds]`
///
/// Returns `None` for missing fields, non-numeric fields and negative days.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<TimeStamp> {
    let mut fields = text.trim().split(':');
    let days = fields.next()?.trim().parse::<i32>().ok().filter(|d| *d >= 0)?;
    let hours = fields.next()?.trim().parse::<u32>().ok()?;
    let minutes = fields.next()?.trim().parse::<u32>().ok()?;
    let seconds = match fields.next() {
        Some(s) => s.trim().parse::<u32>().ok()?,
        None => 0,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(TimeStamp {
        days,
        hours,
        minutes,
        seconds,
    })
}

/// Format a timestamp string with zero-padded fields
#[must_use]
pub fn make_timestamp(days: i32, hours: u32, minutes: u32) -> String {
    TimeStamp::new(days, hours, minutes).to_string()
}

/// Convert a calendar date into a timestamp relative to a birth date
///
/// Returns `None` when `date` precedes `birth_date`.
#[must_use]
pub fn date_to_timestamp(
    date: NaiveDate,
    birth_date: NaiveDate,
    hours: u32,
    minutes: u32,
) -> Option<String> {
    let days = date.signed_duration_since(birth_date).num_days();
    let days = i32::try_from(days).ok().filter(|d| *d >= 0)?;
    Some(make_timestamp(days, hours, minutes))
}
