//! Day keys and effective-day resolution.
//!
//! A member's "day" does not have to end at midnight: with a day-end offset
//! of 3 the 02:30 check-in still counts towards yesterday. The effective day
//! is computed by shifting the instant back by the offset and then reading
//! the calendar date in the member's timezone (UTC when none is set).

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted day-end offset, in hours.
pub const MAX_DAY_END_OFFSET: u8 = 8;

/// A calendar day, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Build a key from year, month and day. Returns `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day before this one.
    pub fn pred(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    /// The day after this one.
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// The key `days` days earlier.
    pub fn days_before(&self, days: u32) -> Option<Self> {
        self.0
            .checked_sub_signed(Duration::days(i64::from(days)))
            .map(Self)
    }

    /// The month this day falls in.
    pub fn month(&self) -> MonthKey {
        MonthKey {
            year: self.0.year(),
            month: self.0.month(),
        }
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| Error::InvalidDate(s.to_string()))
    }
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// Whether `day` falls inside this month.
    pub fn contains(&self, day: DayKey) -> bool {
        day.month() == *self
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDate(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

/// Look up an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}

/// Resolve the effective day for `now`.
///
/// The instant is moved back by `day_end_offset` hours and then formatted in
/// `timezone`. An unknown timezone is logged and treated as UTC.
pub fn day_key(now: DateTime<Utc>, day_end_offset: u8, timezone: Option<&str>) -> DayKey {
    let shifted = now - Duration::hours(i64::from(day_end_offset));

    if let Some(name) = timezone {
        match parse_timezone(name) {
            Ok(tz) => return DayKey(shifted.with_timezone(&tz).date_naive()),
            Err(_) => tracing::warn!(timezone = name, "Unknown timezone, using UTC day"),
        }
    }

    DayKey(shifted.date_naive())
}

/// Wall-clock hour (0..24) at `now` in `timezone`, UTC when unset or unknown.
pub fn local_hour(now: DateTime<Utc>, timezone: Option<&str>) -> u32 {
    match timezone.map(parse_timezone) {
        Some(Ok(tz)) => now.with_timezone(&tz).hour(),
        _ => now.hour(),
    }
}
