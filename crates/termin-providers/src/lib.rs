//! Calendar providers and availability reconciliation.
//!
//! The [`CalendarProvider`] trait is the read-only view of the organizer's
//! remote calendar; [`reconcile_availability`] applies its busy intervals,
//! plus the past-slot rule, to a day's candidate slots.

pub mod availability;
pub mod busy;
pub mod error;
pub mod google;
pub mod provider;

pub use availability::reconcile_availability;
pub use busy::BusyInterval;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use google::GoogleCalendarProvider;
pub use provider::{BoxFuture, CalendarProvider, ErrorProvider, StaticProvider};
