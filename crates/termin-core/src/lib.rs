//! Core types: scheduling policy, time windows, slots, appointments, tokens

pub mod appointment;
pub mod policy;
pub mod slot;
pub mod time;
pub mod token;
pub mod tracing;

pub use appointment::{Appointment, AppointmentStatus};
pub use policy::{BusinessHoursPolicy, PolicyError};
pub use slot::{CandidateSlot, generate_slots};
pub use time::{TimeWindow, resolve_local};
pub use token::ConfirmToken;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
