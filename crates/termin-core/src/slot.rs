//! Candidate slot generation.
//!
//! Slots are the bookable units offered to customers: fixed-length windows
//! walked across the working day in the business timezone. Generation is
//! policy-only; marking slots busy against a remote calendar happens later,
//! in the availability layer.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::BusinessHoursPolicy;
use crate::time::resolve_local;

/// A bookable window on a particular day.
///
/// Slots are ephemeral query results, recomputed per request and never
/// stored. `end` is always `start + slot_duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    /// Start of the slot (inclusive), in UTC.
    pub start: DateTime<Utc>,
    /// End of the slot (exclusive), in UTC.
    pub end: DateTime<Utc>,
    /// Whether the slot can still be booked.
    pub available: bool,
}

impl CandidateSlot {
    /// Creates an available slot.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            available: true,
        }
    }
}

/// Generates the candidate slots for a date under the given policy.
///
/// Returns an empty vector for non-working days. Otherwise the working day
/// is walked from `day_start` in `slot_duration` steps; a trailing slot that
/// would overrun `day_end` is dropped rather than shortened. Output is in
/// chronological order and every slot starts available.
///
/// Wall-clock times erased by a DST spring-forward jump produce no slot.
/// Ambiguous fall-back times resolve to the earlier instant.
pub fn generate_slots<Tz: TimeZone>(
    date: NaiveDate,
    policy: &BusinessHoursPolicy,
    tz: &Tz,
) -> Vec<CandidateSlot> {
    if !policy.is_working_day(date.weekday()) {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut cursor = policy.day_start;

    loop {
        let (slot_end, wrapped) = cursor.overflowing_add_signed(policy.slot_duration);
        if wrapped != 0 || slot_end > policy.day_end {
            break;
        }

        match (
            resolve_local(date, cursor, tz),
            resolve_local(date, slot_end, tz),
        ) {
            (Some(start), Some(end)) if start < end => {
                slots.push(CandidateSlot::new(start, end));
            }
            // One of the boundaries fell into a DST gap, or the slot
            // collapsed across a transition. Skip it.
            _ => {}
        }

        cursor = slot_end;
        if cursor >= policy.day_end {
            break;
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone, Weekday};
    use chrono_tz::Europe::Vienna;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn policy(start: NaiveTime, end: NaiveTime, minutes: i64) -> BusinessHoursPolicy {
        BusinessHoursPolicy {
            day_start: start,
            day_end: end,
            slot_duration: Duration::minutes(minutes),
            ..Default::default()
        }
    }

    #[test]
    fn working_day_full_walk() {
        // Tuesday 2025-02-04, 09:00-17:00 in one-hour steps: eight slots.
        let slots = generate_slots(date(2025, 2, 4), &BusinessHoursPolicy::default(), &Utc);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].start, utc(2025, 2, 4, 9, 0, 0));
        assert_eq!(slots[0].end, utc(2025, 2, 4, 10, 0, 0));
        assert_eq!(slots[7].start, utc(2025, 2, 4, 16, 0, 0));
        assert_eq!(slots[7].end, utc(2025, 2, 4, 17, 0, 0));
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn chronological_order() {
        let slots = generate_slots(date(2025, 2, 4), &BusinessHoursPolicy::default(), &Utc);
        assert!(slots.windows(2).all(|pair| pair[0].end <= pair[1].start));
    }

    #[test]
    fn non_working_day_is_empty() {
        // 2025-02-08 is a Saturday.
        assert_eq!(date(2025, 2, 8).weekday(), Weekday::Sat);
        let slots = generate_slots(date(2025, 2, 8), &BusinessHoursPolicy::default(), &Utc);
        assert!(slots.is_empty());
    }

    #[test]
    fn trailing_partial_slot_dropped() {
        // 09:00-17:30 with 60-minute slots: the 17:00-18:00 candidate
        // overruns day_end and must not appear, shortened or otherwise.
        let p = policy(time(9, 0), time(17, 30), 60);
        let slots = generate_slots(date(2025, 2, 4), &p, &Utc);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[7].end, utc(2025, 2, 4, 17, 0, 0));
    }

    #[test]
    fn slot_times_follow_business_timezone() {
        // Vienna is UTC+1 on 2025-02-04; a 09:00 local slot is 08:00 UTC.
        let slots = generate_slots(date(2025, 2, 4), &BusinessHoursPolicy::default(), &Vienna);
        assert_eq!(slots[0].start, utc(2025, 2, 4, 8, 0, 0));
    }

    #[test]
    fn dst_gap_slots_skipped() {
        // Vienna 2025-03-30: 02:00-03:00 does not exist. A policy opening
        // at 01:00 on that Sunday loses the erased hour.
        let p = BusinessHoursPolicy {
            working_days: vec![Weekday::Sun],
            day_start: time(1, 0),
            day_end: time(5, 0),
            slot_duration: Duration::minutes(60),
        };
        let slots = generate_slots(date(2025, 3, 30), &p, &Vienna);
        // 01:00-02:00 ends on the erased hour and 02:00-03:00 starts on it;
        // only the two post-gap slots remain.
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, utc(2025, 3, 30, 1, 0, 0)); // 03:00 CEST
        assert_eq!(slots[1].start, utc(2025, 3, 30, 2, 0, 0)); // 04:00 CEST
        assert!(slots.iter().all(|s| s.start < s.end));
    }

    #[test]
    fn fall_back_day_keeps_all_slots() {
        // Vienna 2025-10-26: 02:00-03:00 happens twice; slots resolve to
        // the earlier instants and stay strictly ordered.
        let p = BusinessHoursPolicy {
            working_days: vec![Weekday::Sun],
            day_start: time(1, 0),
            day_end: time(5, 0),
            slot_duration: Duration::minutes(60),
        };
        let slots = generate_slots(date(2025, 10, 26), &p, &Vienna);
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| s.start < s.end));
    }

    #[test]
    fn thirty_minute_slots() {
        let p = policy(time(9, 0), time(11, 0), 30);
        let slots = generate_slots(date(2025, 2, 4), &p, &Utc);
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[1].start, utc(2025, 2, 4, 9, 30, 0));
        assert_eq!(slots[1].end, utc(2025, 2, 4, 10, 0, 0));
    }
}
