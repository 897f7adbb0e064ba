//! Booking workflow.
//!
//! Ties slot generation, remote availability and the appointment store
//! together: availability queries return the reconciled slot list for a
//! day, and bookings re-check that list before a tentative appointment is
//! created and its invite rendered.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info};

use termin_core::{BusinessHoursPolicy, CandidateSlot, generate_slots};
use termin_ical::{InviteDocument, InviteError, InviteOptions, Organizer, render_invite};
use termin_providers::{CalendarProvider, ProviderError, reconcile_availability};

use crate::store::AppointmentStore;

/// Errors from availability queries and booking attempts.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The calendar provider failed; availability is unknown.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The appointment could not be rendered as an invite.
    #[error(transparent)]
    Invite(#[from] InviteError),

    /// The requested slot does not exist or is not free.
    #[error("slot not available: {start}")]
    SlotUnavailable { start: DateTime<Utc> },

    /// The booking request itself is malformed.
    #[error("invalid booking request: {message}")]
    InvalidRequest { message: String },
}

impl BookingError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// A booking request, as received from a client.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Customer name for the invite.
    pub customer_name: String,
    /// Customer email for the invite.
    pub customer_email: String,
    /// Requested slot start, UTC. Must match a generated slot exactly.
    pub start: DateTime<Utc>,
    /// Optional location override.
    pub location: Option<String>,
    /// Optional free-form notes.
    pub notes: Option<String>,
}

/// The booking service.
pub struct BookingService {
    store: Arc<AppointmentStore>,
    provider: Arc<dyn CalendarProvider>,
    policy: BusinessHoursPolicy,
    timezone: Tz,
    organizer: Organizer,
    invite_options: InviteOptions,
}

impl BookingService {
    /// Creates a new booking service.
    pub fn new(
        store: Arc<AppointmentStore>,
        provider: Arc<dyn CalendarProvider>,
        policy: BusinessHoursPolicy,
        timezone: Tz,
        organizer: Organizer,
    ) -> Self {
        let invite_options = InviteOptions {
            timezone,
            ..InviteOptions::default()
        };
        Self {
            store,
            provider,
            policy,
            timezone,
            organizer,
            invite_options,
        }
    }

    /// Builder: override the invite options.
    pub fn with_invite_options(mut self, options: InviteOptions) -> Self {
        self.invite_options = options;
        self
    }

    /// Returns the reconciled slots for a date.
    ///
    /// Slots blocked by the remote calendar, by the daemon's own
    /// unresolved bookings, or already in the past come back unavailable.
    pub async fn availability(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateSlot>, BookingError> {
        let slots = generate_slots(date, &self.policy, &self.timezone);
        let mut slots =
            reconcile_availability(slots, date, &self.timezone, self.provider.as_ref(), now)
                .await?;

        for slot in &mut slots {
            if slot.available && self.store.has_conflict(slot.start, slot.end).await {
                slot.available = false;
            }
        }

        debug!(
            %date,
            free = slots.iter().filter(|s| s.available).count(),
            total = slots.len(),
            "Computed availability"
        );
        Ok(slots)
    }

    /// Books a tentative appointment in a free slot and renders its invite.
    ///
    /// Availability is re-checked at booking time; a slot that was free
    /// when the client queried may have been taken since.
    pub async fn book(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<(termin_core::Appointment, InviteDocument), BookingError> {
        if request.customer_name.trim().is_empty() {
            return Err(BookingError::invalid("customer name must not be empty"));
        }
        if !request.customer_email.contains('@') {
            return Err(BookingError::invalid(format!(
                "invalid customer email: {}",
                request.customer_email
            )));
        }

        let date = request.start.with_timezone(&self.timezone).date_naive();
        let slots = self.availability(date, now).await?;

        let slot = slots
            .iter()
            .find(|s| s.start == request.start)
            .filter(|s| s.available)
            .ok_or(BookingError::SlotUnavailable {
                start: request.start,
            })?;

        // The store re-checks the interval under its write lock, so two
        // bookings racing for the same slot produce exactly one appointment.
        let appointment = self
            .store
            .create_if_free(
                request.customer_name,
                request.customer_email,
                slot.start,
                slot.end,
                request.location,
                request.notes,
                now,
            )
            .await
            .ok_or(BookingError::SlotUnavailable {
                start: request.start,
            })?;

        let invite = render_invite(&appointment, &self.organizer, &self.invite_options, now)?;

        info!(
            appointment_id = %appointment.id,
            start = %appointment.start,
            "Booked tentative appointment"
        );
        Ok((appointment, invite))
    }
}
