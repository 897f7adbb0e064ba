//! Booking daemon: slot availability, confirmation lifecycle, expiry sweeper.
//!
//! This crate provides the termin server daemon that handles:
//! - Unix socket IPC for the web backend
//! - Availability queries reconciled against the organizer's calendar
//! - Tentative bookings with invite rendering
//! - Token-gated confirmation and rejection
//! - Background expiry of stale tentative appointments
//!
//! # Example
//!
//! ```rust,no_run
//! use termin_server::{ServerConfig, SocketServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = SocketServer::bind(&config).await?;
//!
//!     // Handle connections...
//!     Ok(())
//! }
//! ```

mod booking;
mod config;
mod error;
mod handler;
mod pidfile;
mod signals;
mod socket;
mod store;
mod sweeper;

pub use booking::{BookingError, BookingRequest, BookingService};
pub use config::{ServerConfig, default_socket_path};
pub use error::{ServerError, ServerResult};
pub use handler::{
    RequestHandler, ServerState, SharedState, make_connection_handler, new_shared_state,
};
pub use pidfile::{PidFile, default_pid_path};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use store::AppointmentStore;
pub use sweeper::{Sweeper, SweeperCommand, SweeperConfig, SweeperHandle};
