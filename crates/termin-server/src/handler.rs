//! Request/response dispatch handler.
//!
//! Routes incoming protocol requests to the booking service and the
//! appointment store and produces responses.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use termin_core::AppointmentStatus;
use termin_protocol::{
    ErrorCode, InviteAttachment, Request, Response, StatusInfo,
};

use termin_ical::InviteDocument;

use crate::booking::{BookingError, BookingRequest, BookingService};
use crate::error::{ServerError, ServerResult};
use crate::signals::ShutdownHandle;
use crate::socket::Connection;
use crate::store::AppointmentStore;

/// Server state shared across all connections.
#[derive(Debug)]
pub struct ServerState {
    /// Server start time.
    start_time: DateTime<Utc>,
    /// When the expiry sweeper last completed.
    last_sweep: Option<DateTime<Utc>>,
    /// Whether shutdown has been requested.
    shutdown_requested: bool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates a new server state.
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            last_sweep: None,
            shutdown_requested: false,
        }
    }

    /// Returns the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        let duration = Utc::now() - self.start_time;
        duration.num_seconds().max(0) as u64
    }

    /// Records a completed sweep.
    pub fn record_sweep(&mut self, at: DateTime<Utc>) {
        self.last_sweep = Some(at);
    }

    /// Returns when the sweeper last completed.
    pub fn last_sweep(&self) -> Option<DateTime<Utc>> {
        self.last_sweep
    }

    /// Requests a shutdown.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    /// Returns true if shutdown has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

/// Shared server state wrapped in an Arc<RwLock>.
pub type SharedState = Arc<RwLock<ServerState>>;

/// Creates a new shared state.
pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(ServerState::new()))
}

/// Request handler that processes incoming requests and produces responses.
pub struct RequestHandler {
    state: SharedState,
    store: Arc<AppointmentStore>,
    booking: Arc<BookingService>,
    shutdown: Option<ShutdownHandle>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(
        state: SharedState,
        store: Arc<AppointmentStore>,
        booking: Arc<BookingService>,
    ) -> Self {
        Self {
            state,
            store,
            booking,
            shutdown: None,
        }
    }

    /// Builder: attach a shutdown handle, triggered by Shutdown requests.
    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = Some(handle);
        self
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(skip(self), fields(request_type, duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        use tracing::Span;

        let start = std::time::Instant::now();
        let request_type = request_name(request);
        Span::current().record("request_type", request_type);

        let response = match request {
            Request::Ping => {
                debug!("Handling Ping request");
                Response::Pong
            }
            Request::Status => {
                debug!("Handling Status request");
                let counts = self.store.counts().await;
                let state = self.state.read().await;
                let mut info = StatusInfo::new(state.uptime_seconds()).with_appointments(counts);
                if let Some(at) = state.last_sweep() {
                    info = info.with_last_sweep(at);
                }
                Response::status(info)
            }
            Request::Availability { date } => {
                debug!(%date, "Handling Availability request");
                match self.booking.availability(*date, Utc::now()).await {
                    Ok(slots) => Response::availability(*date, slots),
                    Err(e) => booking_error_response(e),
                }
            }
            Request::Book {
                customer_name,
                customer_email,
                start,
                location,
                notes,
            } => {
                debug!(%start, "Handling Book request");
                let booking_request = BookingRequest {
                    customer_name: customer_name.clone(),
                    customer_email: customer_email.clone(),
                    start: *start,
                    location: location.clone(),
                    notes: notes.clone(),
                };
                match self.booking.book(booking_request, Utc::now()).await {
                    Ok((appointment, invite)) => Response::Booked {
                        appointment,
                        invite: InviteAttachment {
                            filename: invite.filename,
                            mime_type: InviteDocument::MIME_TYPE.to_string(),
                            content: invite.content,
                        },
                    },
                    Err(e) => booking_error_response(e),
                }
            }
            Request::Confirm {
                appointment_id,
                token,
            } => {
                debug!(%appointment_id, "Handling Confirm request");
                let outcome = self
                    .store
                    .resolve(appointment_id, token, AppointmentStatus::Confirmed, Utc::now())
                    .await;
                Response::resolution(outcome)
            }
            Request::Reject {
                appointment_id,
                token,
            } => {
                debug!(%appointment_id, "Handling Reject request");
                let outcome = self
                    .store
                    .resolve(appointment_id, token, AppointmentStatus::Rejected, Utc::now())
                    .await;
                Response::resolution(outcome)
            }
            Request::Shutdown => {
                info!("Handling Shutdown request");
                self.state.write().await.request_shutdown();
                if let Some(ref handle) = self.shutdown {
                    handle.trigger();
                }
                Response::Ok
            }
        };

        // Record timing metrics at DEBUG level
        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(
                request_type = %request_type,
                duration_ms = duration.as_millis(),
                "Request handled"
            );
        }

        response
    }

    /// Handles a connection, processing all requests until the connection closes.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;

                    // Check if shutdown was requested
                    if self.state.read().await.shutdown_requested() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    // Client disconnected cleanly
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }
}

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::Availability { .. } => "availability",
        Request::Book { .. } => "book",
        Request::Confirm { .. } => "confirm",
        Request::Reject { .. } => "reject",
        Request::Status => "status",
        Request::Shutdown => "shutdown",
        Request::Ping => "ping",
    }
}

/// Maps a booking failure to a protocol error response.
///
/// A provider failure means availability is unknown; it is never reported
/// as a free day.
fn booking_error_response(error: BookingError) -> Response {
    match error {
        BookingError::Provider(e) => {
            warn!(error = %e, "Calendar provider failed");
            Response::error(ErrorCode::AvailabilityUnknown, e.to_string())
        }
        BookingError::SlotUnavailable { start } => Response::error(
            ErrorCode::SlotUnavailable,
            format!("slot not available: {}", start),
        ),
        BookingError::InvalidRequest { message } => {
            Response::error(ErrorCode::InvalidRequest, message)
        }
        BookingError::Invite(e) => {
            warn!(error = %e, "Invite rendering failed");
            Response::error(ErrorCode::InternalError, e.to_string())
        }
    }
}

/// Creates the per-connection handler passed to
/// `SocketServer::run_until_shutdown`.
pub fn make_connection_handler(
    state: SharedState,
    store: Arc<AppointmentStore>,
    booking: Arc<BookingService>,
    shutdown: ShutdownHandle,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static {
    move |conn| {
        let handler = RequestHandler::new(state.clone(), store.clone(), booking.clone())
            .with_shutdown_handle(shutdown.clone());
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}
