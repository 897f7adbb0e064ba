//! Availability reconciliation.
//!
//! Takes the policy-generated candidate slots for a day and marks the ones
//! the organizer cannot actually take: slots overlapping a remote busy
//! interval and slots whose start is already in the past. Slots are only
//! ever flipped to unavailable here; the output has the same length and
//! order as the input.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::debug;

use termin_core::{CandidateSlot, TimeWindow};

use crate::error::ProviderResult;
use crate::provider::CalendarProvider;

/// Marks busy and past candidate slots as unavailable.
///
/// Queries the provider once, for the full local day of `date`, then applies
/// half-open overlap against every busy interval and filters slots that
/// start at or before `now`.
///
/// # Errors
///
/// A provider failure propagates unchanged. Availability is then unknown;
/// there is no fallback that would present a possibly-busy day as free.
pub async fn reconcile_availability<Tz: TimeZone>(
    mut slots: Vec<CandidateSlot>,
    date: NaiveDate,
    tz: &Tz,
    provider: &dyn CalendarProvider,
    now: DateTime<Utc>,
) -> ProviderResult<Vec<CandidateSlot>> {
    if slots.is_empty() {
        // Non-working day; nothing to reconcile and no reason to hit the
        // provider.
        return Ok(slots);
    }

    let window = TimeWindow::for_date(date, tz);
    let busy = provider.list_busy(window).await?;
    debug!(
        provider = provider.name(),
        busy_intervals = busy.len(),
        "reconciling slot availability"
    );

    for slot in &mut slots {
        if busy.iter().any(|b| b.overlaps(slot.start, slot.end)) {
            slot.available = false;
        }
        if slot.start <= now {
            slot.available = false;
        }
    }

    Ok(slots)
}
