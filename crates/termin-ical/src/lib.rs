//! RFC 5545 invite serialization.
//!
//! Builds the `METHOD:REQUEST` documents sent alongside tentative
//! appointments: content-line escaping and folding, embedded VTIMEZONE
//! definitions, and the VEVENT/VALARM assembly itself.

pub mod contentline;
pub mod invite;
pub mod timezone;

pub use contentline::{LineWriter, escape_text, param_value};
pub use invite::{InviteDocument, InviteError, InviteOptions, Organizer, render_invite};
pub use timezone::{ObservanceRule, TimezoneSpec};
