//! Time and timestamp helpers.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// UTC timestamp used for schedule times, lifecycle stamps and stats.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Calendar view of an instant, as consumed by schedule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSlot {
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    /// 1 ..= 31.
    pub day_of_month: u8,
    /// 0 ..= 23.
    pub hour: u8,
    /// 0 ..= 59.
    pub minute: u8,
}

impl CalendarSlot {
    /// Break a timestamp down into its calendar components (UTC).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn of(ts: Timestamp) -> Self {
        Self {
            day_of_week: ts.weekday().num_days_from_sunday() as u8,
            day_of_month: ts.day() as u8,
            hour: ts.hour() as u8,
            minute: ts.minute() as u8,
        }
    }
}

/// Truncate a timestamp to the start of its hour.
#[must_use]
pub fn hour_slot(ts: Timestamp) -> Timestamp {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}
