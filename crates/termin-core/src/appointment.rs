//! The appointment entity and its confirmation lifecycle.
//!
//! An appointment is created tentative with a confirmation token and an
//! expiry deadline. Exactly one transition out of [`AppointmentStatus::Tentative`]
//! is possible; confirmed, rejected and expired are all terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::ConfirmToken;

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Created, waiting for the customer to confirm or reject.
    Tentative,
    /// The customer confirmed with a valid token.
    Confirmed,
    /// The customer rejected with a valid token.
    Rejected,
    /// The confirmation window elapsed without a resolution.
    Expired,
}

impl AppointmentStatus {
    /// Returns true for states an appointment can never leave.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Tentative)
    }
}

/// A scheduled consultation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Unique identifier, assigned at creation.
    pub id: String,
    /// Name of the customer requesting the appointment.
    pub customer_name: String,
    /// Email address the invite and confirmation go to.
    pub customer_email: String,
    /// Start of the appointment, in UTC.
    pub start: DateTime<Utc>,
    /// End of the appointment, in UTC.
    pub end: DateTime<Utc>,
    /// Where the appointment takes place.
    pub location: Option<String>,
    /// Free-form notes from the booking request.
    pub description: Option<String>,
    /// Current lifecycle state.
    pub status: AppointmentStatus,
    /// The outstanding confirmation token. Cleared on any terminal
    /// transition; a resolved appointment holds no credential.
    pub confirm_token: Option<ConfirmToken>,
    /// When the token was issued.
    pub token_issued_at: DateTime<Utc>,
    /// Deadline after which the tentative appointment expires.
    pub expires_at: DateTime<Utc>,
}

impl Appointment {
    /// Creates a tentative appointment with a freshly issued token.
    pub fn tentative(
        id: impl Into<String>,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            start,
            end,
            location: None,
            description: None,
            status: AppointmentStatus::Tentative,
            confirm_token: Some(ConfirmToken::issue()),
            token_issued_at: now,
            expires_at,
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true while the appointment awaits resolution.
    pub fn is_tentative(&self) -> bool {
        self.status == AppointmentStatus::Tentative
    }

    /// Returns true if the confirmation window has elapsed at `now`.
    ///
    /// Only meaningful for tentative appointments; resolved ones keep
    /// their terminal status no matter the clock.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Moves the appointment into a terminal state and drops the token.
    ///
    /// Callers must hold whatever lock guards this appointment and must
    /// have already checked that the current status is tentative.
    pub fn resolve(&mut self, status: AppointmentStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.confirm_token = None;
    }

    /// Duration of the appointment in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}
