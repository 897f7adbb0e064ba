//! Request and response types for the termin protocol.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use termin_core::{Appointment, AppointmentStatus, CandidateSlot};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
///
/// Every message exchanged between client and server is wrapped in this envelope
/// which provides versioning and request correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Returns the protocol version.
    pub fn version(&self) -> &str {
        &self.protocol_version
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Request types that can be sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Get the candidate slots for a date, reconciled against the
    /// organizer's calendar.
    Availability {
        /// The date to query, in the business timezone.
        date: NaiveDate,
    },

    /// Book a tentative appointment in a free slot.
    Book {
        /// Customer name for the invite.
        customer_name: String,
        /// Customer email for the invite.
        customer_email: String,
        /// Requested slot start, UTC.
        start: DateTime<Utc>,
        /// Optional location override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        /// Optional free-form notes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },

    /// Confirm a tentative appointment with its token.
    Confirm {
        /// The appointment identifier.
        appointment_id: String,
        /// The confirmation token issued at booking.
        token: String,
    },

    /// Reject a tentative appointment with its token.
    Reject {
        /// The appointment identifier.
        appointment_id: String,
        /// The confirmation token issued at booking.
        token: String,
    },

    /// Get server status.
    Status,

    /// Request server shutdown.
    Shutdown,

    /// Ping to check server liveness.
    Ping,
}

impl Request {
    /// Creates an Availability request.
    pub fn availability(date: NaiveDate) -> Self {
        Self::Availability { date }
    }

    /// Creates a Confirm request.
    pub fn confirm(appointment_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Confirm {
            appointment_id: appointment_id.into(),
            token: token.into(),
        }
    }

    /// Creates a Reject request.
    pub fn reject(appointment_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Reject {
            appointment_id: appointment_id.into(),
            token: token.into(),
        }
    }
}

/// The outcome of a confirm or reject attempt.
///
/// Unknown appointment ids, token mismatches and expired windows all
/// collapse into [`ResolutionOutcome::InvalidOrExpired`]; the response never
/// reveals which of the three occurred. Losing a race to a concurrent
/// resolution is not an error and reports the actual terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// This request performed the transition.
    Resolved {
        /// The new terminal status.
        status: AppointmentStatus,
    },
    /// The appointment had already left its tentative state.
    AlreadyResolved {
        /// The status it holds.
        status: AppointmentStatus,
    },
    /// Unknown appointment, wrong token, or expired confirmation window.
    InvalidOrExpired,
}

/// An invite attachment accompanying a booking response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteAttachment {
    /// Attachment filename (`termin-<id>.ics`).
    pub filename: String,
    /// MIME type (`text/calendar; method=REQUEST`).
    pub mime_type: String,
    /// The iCalendar document, CRLF line endings.
    pub content: String,
}

/// Response types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Reconciled slots for a date.
    Availability {
        /// The queried date.
        date: NaiveDate,
        /// Slots in chronological order.
        slots: Vec<CandidateSlot>,
    },

    /// A tentative appointment was created.
    Booked {
        /// The stored appointment, including its confirmation token.
        /// This is the only message that ever carries the token.
        appointment: Appointment,
        /// The rendered invite for the outbound notification.
        invite: InviteAttachment,
    },

    /// Outcome of a confirm or reject request.
    Resolution {
        /// The outcome.
        #[serde(flatten)]
        outcome: ResolutionOutcome,
    },

    /// Server status information.
    Status {
        /// Status details.
        #[serde(flatten)]
        info: StatusInfo,
    },

    /// Generic success response.
    Ok,

    /// Error response.
    Error {
        /// Error details.
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// Pong response to Ping.
    Pong,
}

impl Response {
    /// Creates an Availability response.
    pub fn availability(date: NaiveDate, slots: Vec<CandidateSlot>) -> Self {
        Self::Availability { date, slots }
    }

    /// Creates a Resolution response.
    pub fn resolution(outcome: ResolutionOutcome) -> Self {
        Self::Resolution { outcome }
    }

    /// Creates a Status response.
    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    /// Creates an Error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse {
                code,
                message: message.into(),
            },
        }
    }

    /// Creates an error response from an ErrorResponse.
    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error { error }
    }

    /// Returns true if this is a success response.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Server status information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Server uptime in seconds.
    pub uptime_seconds: u64,

    /// Appointments per lifecycle state.
    pub appointments: AppointmentCounts,

    /// When the expiry sweeper last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sweep: Option<DateTime<Utc>>,
}

impl StatusInfo {
    /// Creates a new StatusInfo.
    pub fn new(uptime_seconds: u64) -> Self {
        Self {
            uptime_seconds,
            appointments: AppointmentCounts::default(),
            last_sweep: None,
        }
    }

    /// Builder: set appointment counts.
    pub fn with_appointments(mut self, counts: AppointmentCounts) -> Self {
        self.appointments = counts;
        self
    }

    /// Builder: set last_sweep.
    pub fn with_last_sweep(mut self, last_sweep: DateTime<Utc>) -> Self {
        self.last_sweep = Some(last_sweep);
        self
    }
}

/// Appointment counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCounts {
    /// Appointments awaiting confirmation.
    pub tentative: usize,
    /// Confirmed appointments.
    pub confirmed: usize,
    /// Rejected appointments.
    pub rejected: usize,
    /// Expired appointments.
    pub expired: usize,
}

/// Error codes for protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown or internal error.
    InternalError,

    /// Invalid request format.
    InvalidRequest,

    /// The calendar provider failed; availability is unknown.
    AvailabilityUnknown,

    /// The requested slot cannot be booked.
    SlotUnavailable,

    /// Server is shutting down.
    ShuttingDown,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::AvailabilityUnknown => "Calendar availability could not be determined",
            Self::SlotUnavailable => "The requested slot cannot be booked",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

/// Error response details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}
