//! Half-open time ranges for historical backfill.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::TimeRangeError;

/// A half-open range `[from_ms, to_ms)` of epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Start (inclusive).
    pub from_ms: i64,
    /// End (exclusive).
    pub to_ms: i64,
}

impl TimeRange {
    /// Creates a new range, validating that `from_ms < to_ms`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty.
    pub fn new(from_ms: i64, to_ms: i64) -> Result<Self, TimeRangeError> {
        if from_ms >= to_ms {
            return Err(TimeRangeError::Empty { from_ms, to_ms });
        }
        Ok(Self { from_ms, to_ms })
    }

    /// Creates a range covering whole UTC days, `start` through `end` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` is after `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeRangeError> {
        let from_ms = midnight_ms(start);
        let to_ms = end
            .succ_opt()
            .map_or(i64::MAX, midnight_ms);
        Self::new(from_ms, to_ms)
    }

    /// Parses a range from two textual bounds.
    ///
    /// Each bound may be a date (`YYYY-MM-DD`, midnight UTC), an RFC 3339
    /// timestamp, or integer epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is unparseable or the range is empty.
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeRangeError> {
        Self::new(parse_bound(from)?, parse_bound(to)?)
    }

    /// Returns true if the range contains the given instant.
    #[must_use]
    pub const fn contains(&self, ms: i64) -> bool {
        ms >= self.from_ms && ms < self.to_ms
    }

    /// Returns the length of the range in milliseconds, saturating at `i64::MAX`.
    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.to_ms.saturating_sub(self.from_ms)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (to_datetime(self.from_ms), to_datetime(self.to_ms)) {
            (Some(from), Some(to)) => write!(f, "[{}, {})", from.to_rfc3339(), to.to_rfc3339()),
            _ => write!(f, "[{}, {})", self.from_ms, self.to_ms),
        }
    }
}

/// Parses a single range bound into epoch milliseconds.
///
/// # Errors
///
/// Returns an error if the text is not a date, RFC 3339 timestamp or integer.
pub fn parse_bound(text: &str) -> Result<i64, TimeRangeError> {
    let text = text.trim();
    if let Ok(ms) = text.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(midnight_ms(date));
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| TimeRangeError::Parse(text.to_string()))
}

fn midnight_ms(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .timestamp_millis()
}

fn to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
