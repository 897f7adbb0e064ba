//! Time types for scheduling.
//!
//! This module provides [`TimeWindow`] for half-open UTC intervals and the
//! local-time resolution helpers used when converting business-timezone wall
//! clock times into instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Resolves a wall-clock time on a date in the given timezone to a UTC instant.
///
/// Returns `None` when the wall-clock time does not exist in that zone (it
/// falls inside a DST spring-forward gap). When the time exists twice (the
/// fall-back hour), the earlier instant is chosen.
pub fn resolve_local<Tz: TimeZone>(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// A time window for querying calendar data.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Creates a time window covering a single day in the given timezone.
    ///
    /// The boundaries are the local midnights of `date` and its successor.
    /// A midnight erased by a DST transition resolves to the first existing
    /// wall-clock hour after it.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let start = day_boundary(date, tz);
        let end = day_boundary(date.succ_opt().unwrap_or(date), tz);
        Self { start, end }
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if another half-open interval overlaps with this window.
    ///
    /// An interval overlaps if it starts before the window ends AND ends
    /// after the window starts. Intervals that merely touch at a boundary
    /// do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

fn day_boundary<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = NaiveTime::MIN;
    if let Some(dt) = resolve_local(date, midnight, tz) {
        return dt;
    }
    // Midnight fell in a DST gap. Walk forward by the hour until a wall
    // clock time exists again; transitions are at most a few hours wide.
    for hour in 1..=3 {
        let (time, _) = midnight.overflowing_add_signed(Duration::hours(hour));
        if let Some(dt) = resolve_local(date, time, tz) {
            return dt;
        }
    }
    // No timezone in the IANA database erases more than a few hours.
    date.and_time(midnight).and_utc()
}
