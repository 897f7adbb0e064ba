//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;

use termin_core::BusinessHoursPolicy;

use crate::error::{ServerError, ServerResult};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Whether to remove stale socket on startup.
    pub cleanup_stale_socket: bool,

    /// Business timezone for slot generation and invites.
    pub timezone: Tz,

    /// Business hours policy.
    pub policy: BusinessHoursPolicy,

    /// How long a tentative appointment may stay unconfirmed.
    pub confirmation_window: chrono::Duration,

    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,

    /// Organizer name for outgoing invites.
    pub organizer_name: String,

    /// Organizer email for outgoing invites.
    pub organizer_email: String,

    /// Remote calendar identifier to reconcile against.
    pub calendar_id: String,

    /// Access token for the calendar provider.
    pub calendar_access_token: String,

    /// Timeout for calendar provider requests.
    pub provider_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 100,
            cleanup_stale_socket: true,
            timezone: chrono_tz::Europe::Vienna,
            policy: BusinessHoursPolicy::default(),
            confirmation_window: chrono::Duration::hours(24),
            sweep_interval: Duration::from_secs(300),
            organizer_name: "NEST-Haus Beratung".to_string(),
            organizer_email: "termine@nest-haus.at".to_string(),
            calendar_id: "primary".to_string(),
            calendar_access_token: String::new(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration with the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Builder: set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set cleanup stale socket.
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }

    /// Builder: set business timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Builder: set business hours policy.
    pub fn with_policy(mut self, policy: BusinessHoursPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: set confirmation window.
    pub fn with_confirmation_window(mut self, window: chrono::Duration) -> Self {
        self.confirmation_window = window;
        self
    }

    /// Builder: set sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builds a configuration from process environment variables.
    ///
    /// Recognized variables: `TERMIN_SOCKET`, `TERMIN_TIMEZONE`,
    /// `TERMIN_CALENDAR_ID`, `TERMIN_CALENDAR_TOKEN`, `TERMIN_ORGANIZER_NAME`,
    /// `TERMIN_ORGANIZER_EMAIL`, `TERMIN_WORKING_DAYS`, `TERMIN_DAY_START`,
    /// `TERMIN_DAY_END`, `TERMIN_SLOT_MINUTES`, `TERMIN_CONFIRM_WINDOW_HOURS`
    /// and `TERMIN_SWEEP_SECS`.
    pub fn from_env() -> ServerResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from the given variable lookup.
    ///
    /// Unset variables leave the current value alone; a set but unparseable
    /// value is a configuration error.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(path) = var("TERMIN_SOCKET") {
            self.socket_path = PathBuf::from(path);
        }
        if let Some(tz) = var("TERMIN_TIMEZONE") {
            self.timezone = tz
                .parse()
                .map_err(|_| ServerError::config(format!("unknown timezone: {}", tz)))?;
        }
        if let Some(id) = var("TERMIN_CALENDAR_ID") {
            self.calendar_id = id;
        }
        if let Some(token) = var("TERMIN_CALENDAR_TOKEN") {
            self.calendar_access_token = token;
        }
        if let Some(name) = var("TERMIN_ORGANIZER_NAME") {
            self.organizer_name = name;
        }
        if let Some(email) = var("TERMIN_ORGANIZER_EMAIL") {
            self.organizer_email = email;
        }
        if let Some(days) = var("TERMIN_WORKING_DAYS") {
            self.policy.working_days = days
                .split(',')
                .map(|day| {
                    day.trim().parse::<Weekday>().map_err(|_| {
                        ServerError::config(format!("unknown weekday: {}", day.trim()))
                    })
                })
                .collect::<ServerResult<Vec<_>>>()?;
        }
        if let Some(start) = var("TERMIN_DAY_START") {
            self.policy.day_start = parse_clock("TERMIN_DAY_START", &start)?;
        }
        if let Some(end) = var("TERMIN_DAY_END") {
            self.policy.day_end = parse_clock("TERMIN_DAY_END", &end)?;
        }
        if let Some(minutes) = var("TERMIN_SLOT_MINUTES") {
            let minutes = minutes.parse::<i64>().map_err(|_| {
                ServerError::config(format!("invalid TERMIN_SLOT_MINUTES: {}", minutes))
            })?;
            self.policy.slot_duration = chrono::Duration::minutes(minutes);
        }
        if let Some(hours) = var("TERMIN_CONFIRM_WINDOW_HOURS") {
            let hours = hours.parse::<i64>().map_err(|_| {
                ServerError::config(format!("invalid TERMIN_CONFIRM_WINDOW_HOURS: {}", hours))
            })?;
            self.confirmation_window = chrono::Duration::hours(hours);
        }
        if let Some(secs) = var("TERMIN_SWEEP_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                ServerError::config(format!("invalid TERMIN_SWEEP_SECS: {}", secs))
            })?;
            self.sweep_interval = Duration::from_secs(secs);
        }

        Ok(())
    }

    /// Validates the configuration.
    ///
    /// A misconfigured policy or organizer is fatal at startup rather than
    /// a per-request failure.
    pub fn validate(&self) -> ServerResult<()> {
        self.policy
            .validate()
            .map_err(|e| ServerError::config(e.to_string()))?;

        if self.confirmation_window <= chrono::Duration::zero() {
            return Err(ServerError::config(
                "confirmation window must be positive",
            ));
        }
        if !self.organizer_email.contains('@') {
            return Err(ServerError::config(format!(
                "invalid organizer email: {}",
                self.organizer_email
            )));
        }
        if self.calendar_id.is_empty() {
            return Err(ServerError::config("calendar id must not be empty"));
        }

        Ok(())
    }
}

/// Parses a `HH:MM` clock value.
fn parse_clock(name: &str, value: &str) -> ServerResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ServerError::config(format!("invalid {} (expected HH:MM): {}", name, value)))
}

/// Returns the default socket path.
///
/// Uses `$XDG_RUNTIME_DIR/termin.sock` if available,
/// otherwise falls back to `/tmp/termin-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("termin.sock")
    } else {
        // Fallback to /tmp with UID
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/termin-{}.sock", uid))
    }
}
