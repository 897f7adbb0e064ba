//! Background expiry sweeper.
//!
//! Periodically walks the appointment store and expires tentative
//! appointments whose confirmation window has elapsed. The interval gets
//! a small jitter so several daemons on one host do not sweep in lockstep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::handler::SharedState;
use crate::store::AppointmentStore;

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Base interval between sweeps.
    pub interval: Duration,
    /// Maximum jitter to add to the interval (as fraction 0.0-1.0).
    pub jitter_fraction: f64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            jitter_fraction: 0.1,               // 10% jitter
        }
    }
}

impl SweeperConfig {
    /// Creates a new sweeper config with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Calculates the next sweep delay with jitter.
    pub fn next_delay(&self) -> Duration {
        let base = self.interval.as_secs_f64();
        let jitter_range = base * self.jitter_fraction;
        let jitter = rand_jitter(jitter_range);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// Simple pseudo-random jitter generator.
/// Uses the current time to generate a value in [-range, range].
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    // Map nanos to [-range, range]
    let fraction = (nanos as f64) / (1_000_000_000.0);
    (fraction * 2.0 - 1.0) * range
}

/// Commands that can be sent to the sweeper.
#[derive(Debug, Clone)]
pub enum SweeperCommand {
    /// Trigger an immediate sweep.
    SweepNow,
    /// Stop the sweeper.
    Stop,
}

/// The sweeper expires stale appointments on a schedule.
pub struct Sweeper {
    config: SweeperConfig,
    command_tx: mpsc::Sender<SweeperCommand>,
    command_rx: Option<mpsc::Receiver<SweeperCommand>>,
}

impl Sweeper {
    /// Creates a new sweeper with the given configuration.
    pub fn new(config: SweeperConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Returns a handle for sending commands to the sweeper.
    pub fn handle(&self) -> SweeperHandle {
        SweeperHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Runs the sweeper loop against the given store.
    ///
    /// Each sweep records its completion time in the shared server state
    /// for the status endpoint.
    pub async fn run(mut self, store: Arc<AppointmentStore>, state: SharedState) {
        let mut command_rx = self.command_rx.take().expect("run called twice");

        info!(
            interval_secs = self.config.interval.as_secs(),
            "Expiry sweeper started"
        );

        // Initial sweep
        self.do_sweep(&store, &state).await;

        loop {
            let delay = self.config.next_delay();
            debug!(delay_secs = delay.as_secs(), "Scheduling next sweep");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.do_sweep(&store, &state).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SweeperCommand::SweepNow) => {
                            debug!("Received SweepNow command");
                            self.do_sweep(&store, &state).await;
                        }
                        Some(SweeperCommand::Stop) | None => {
                            info!("Expiry sweeper stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn do_sweep(&self, store: &AppointmentStore, state: &SharedState) {
        let now = Utc::now();
        let expired = store.sweep_expired(now).await;
        state.write().await.record_sweep(now);
        debug!(expired, "Sweep completed");
    }
}

/// Handle for sending commands to a running sweeper.
#[derive(Clone, Debug)]
pub struct SweeperHandle {
    command_tx: mpsc::Sender<SweeperCommand>,
}

impl SweeperHandle {
    /// Triggers an immediate sweep.
    pub async fn sweep_now(&self) -> Result<(), mpsc::error::SendError<SweeperCommand>> {
        self.command_tx.send(SweeperCommand::SweepNow).await
    }

    /// Stops the sweeper.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SweeperCommand>> {
        self.command_tx.send(SweeperCommand::Stop).await
    }
}
