//! Busy intervals: the read-only projection of remote calendar events.
//!
//! Scheduling never needs titles, attendees or links from the remote
//! calendar. The only question is "when is the organizer not free", so
//! provider events collapse to UTC intervals before they reach the
//! reconciler.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use termin_core::TimeWindow;

/// A half-open `[start, end)` interval during which the calendar is busy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    /// Start of the busy interval (inclusive), in UTC.
    pub start: DateTime<Utc>,
    /// End of the busy interval (exclusive), in UTC.
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Creates a busy interval from UTC instants.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Expands an all-day event into the full local days it covers.
    ///
    /// Calendar APIs report all-day events as date pairs with an exclusive
    /// end date. The interval spans local midnight to local midnight in the
    /// business timezone, so an all-day entry blocks every slot of that day.
    pub fn from_all_day<Tz: TimeZone>(start_date: NaiveDate, end_date: NaiveDate, tz: &Tz) -> Self {
        let start = TimeWindow::for_date(start_date, tz).start;
        // end_date is exclusive; the window helper already points at its midnight.
        let last_day = end_date.pred_opt().unwrap_or(start_date);
        let end = TimeWindow::for_date(last_day, tz).end;
        Self { start, end }
    }

    /// Returns true when this interval overlaps the given half-open range.
    ///
    /// Adjacent intervals (touching at a boundary) do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Vienna;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn overlap_semantics() {
        let busy = BusyInterval::new(utc(2025, 2, 4, 13, 0, 0), utc(2025, 2, 4, 14, 0, 0));

        assert!(busy.overlaps(utc(2025, 2, 4, 13, 0, 0), utc(2025, 2, 4, 14, 0, 0)));
        assert!(busy.overlaps(utc(2025, 2, 4, 13, 30, 0), utc(2025, 2, 4, 14, 30, 0)));
        // Slot ending exactly when the busy interval starts is free.
        assert!(!busy.overlaps(utc(2025, 2, 4, 12, 0, 0), utc(2025, 2, 4, 13, 0, 0)));
        // Slot starting exactly when the busy interval ends is free.
        assert!(!busy.overlaps(utc(2025, 2, 4, 14, 0, 0), utc(2025, 2, 4, 15, 0, 0)));
    }

    #[test]
    fn all_day_expansion_covers_local_day() {
        // Single-day all-day event: API reports [2025-02-04, 2025-02-05).
        let busy = BusyInterval::from_all_day(date(2025, 2, 4), date(2025, 2, 5), &Vienna);
        assert_eq!(busy.start, utc(2025, 2, 3, 23, 0, 0));
        assert_eq!(busy.end, utc(2025, 2, 4, 23, 0, 0));
    }

    #[test]
    fn multi_day_all_day_expansion() {
        let busy = BusyInterval::from_all_day(date(2025, 2, 4), date(2025, 2, 7), &Vienna);
        assert_eq!(busy.start, utc(2025, 2, 3, 23, 0, 0));
        assert_eq!(busy.end, utc(2025, 2, 6, 23, 0, 0));
    }

    #[test]
    fn serde_roundtrip() {
        let busy = BusyInterval::new(utc(2025, 2, 4, 13, 0, 0), utc(2025, 2, 4, 14, 0, 0));
        let json = serde_json::to_string(&busy).unwrap();
        let parsed: BusyInterval = serde_json::from_str(&json).unwrap();
        assert_eq!(busy, parsed);
    }
}
