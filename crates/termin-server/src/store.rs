//! In-memory appointment store.
//!
//! Holds every appointment the daemon knows about and owns the
//! confirmation state machine. All transitions happen under a single write
//! lock, so a confirm racing a reject sees exactly one winner.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::RwLock;
use tracing::{debug, info};

use termin_core::{Appointment, AppointmentStatus};
use termin_protocol::{AppointmentCounts, ResolutionOutcome};

/// Thread-safe appointment store.
#[derive(Debug)]
pub struct AppointmentStore {
    appointments: RwLock<HashMap<String, Appointment>>,
    confirmation_window: Duration,
}

impl AppointmentStore {
    /// Creates an empty store with the given confirmation window.
    pub fn new(confirmation_window: Duration) -> Self {
        Self {
            appointments: RwLock::new(HashMap::new()),
            confirmation_window,
        }
    }

    /// Creates a tentative appointment unless the interval is taken, and
    /// returns it, token included.
    ///
    /// The conflict check and the insert happen under the same write lock,
    /// so two bookings racing for one slot see exactly one winner. This is
    /// also the only place the token ever leaves the store.
    pub async fn create_if_free(
        &self,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        location: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Appointment> {
        let mut map = self.appointments.write().await;

        if overlaps_active(&map, start, end) {
            debug!(%start, "Slot already claimed by another appointment");
            return None;
        }

        let id = new_appointment_id();
        let mut appointment = Appointment::tentative(
            &id,
            customer_name,
            customer_email,
            start,
            end,
            now,
            now + self.confirmation_window,
        );
        if let Some(location) = location {
            appointment = appointment.with_location(location);
        }
        if let Some(notes) = notes {
            appointment = appointment.with_description(notes);
        }

        map.insert(id.clone(), appointment.clone());
        info!(
            appointment_id = %id,
            start = %start,
            expires_at = %appointment.expires_at,
            "Created tentative appointment"
        );
        Some(appointment)
    }

    /// Attempts a terminal transition with the given token.
    ///
    /// The check order is fixed: unknown id first, then terminal status,
    /// then expiry, then the token. A replay against a resolved appointment
    /// therefore reports the actual status without ever touching the token,
    /// while unknown ids, expired windows and bad tokens are
    /// indistinguishable to the caller.
    pub async fn resolve(
        &self,
        appointment_id: &str,
        token: &str,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> ResolutionOutcome {
        debug_assert!(matches!(
            target,
            AppointmentStatus::Confirmed | AppointmentStatus::Rejected
        ));

        let mut map = self.appointments.write().await;

        let Some(appointment) = map.get_mut(appointment_id) else {
            debug!(appointment_id, "Resolution for unknown appointment");
            return ResolutionOutcome::InvalidOrExpired;
        };

        if appointment.status.is_terminal() {
            debug!(
                appointment_id,
                status = ?appointment.status,
                "Resolution replay against resolved appointment"
            );
            return ResolutionOutcome::AlreadyResolved {
                status: appointment.status,
            };
        }

        if appointment.is_expired_at(now) {
            // The sweeper has not caught up yet; expire in place.
            appointment.resolve(AppointmentStatus::Expired);
            debug!(appointment_id, "Resolution against expired appointment");
            return ResolutionOutcome::InvalidOrExpired;
        }

        let token_matches = appointment
            .confirm_token
            .as_ref()
            .is_some_and(|t| t.verify(token));
        if !token_matches {
            debug!(appointment_id, "Resolution with invalid token");
            return ResolutionOutcome::InvalidOrExpired;
        }

        appointment.resolve(target);
        info!(appointment_id, status = ?target, "Appointment resolved");
        ResolutionOutcome::Resolved { status: target }
    }

    /// Expires all tentative appointments whose window has elapsed.
    ///
    /// Returns the number of appointments expired by this pass. Running the
    /// sweep twice in a row is a no-op the second time.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.appointments.write().await;
        let mut expired = 0;

        for appointment in map.values_mut() {
            if appointment.is_tentative() && appointment.is_expired_at(now) {
                appointment.resolve(AppointmentStatus::Expired);
                expired += 1;
            }
        }

        if expired > 0 {
            info!(count = expired, "Expired unconfirmed appointments");
        }
        expired
    }

    /// Returns a copy of the appointment, if it exists.
    pub async fn get(&self, appointment_id: &str) -> Option<Appointment> {
        self.appointments.read().await.get(appointment_id).cloned()
    }

    /// Returns true if a tentative or confirmed appointment overlaps the
    /// given half-open interval.
    pub async fn has_conflict(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let map = self.appointments.read().await;
        overlaps_active(&map, start, end)
    }

    /// Returns appointment counts per lifecycle state.
    pub async fn counts(&self) -> AppointmentCounts {
        let map = self.appointments.read().await;
        let mut counts = AppointmentCounts::default();
        for appointment in map.values() {
            match appointment.status {
                AppointmentStatus::Tentative => counts.tentative += 1,
                AppointmentStatus::Confirmed => counts.confirmed += 1,
                AppointmentStatus::Rejected => counts.rejected += 1,
                AppointmentStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }
}

/// Half-open overlap against appointments still holding their slot.
///
/// Rejected and expired appointments release the interval.
fn overlaps_active(
    map: &HashMap<String, Appointment>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    map.values().any(|a| {
        matches!(
            a.status,
            AppointmentStatus::Tentative | AppointmentStatus::Confirmed
        ) && a.start < end
            && start < a.end
    })
}

/// Generates a random appointment identifier.
fn new_appointment_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
