//! Single-instance guard.
//!
//! The appointment store lives in memory, so two daemons would each hand
//! out tokens and sweep expiries against disjoint state. A PID file keeps
//! the second instance from starting; a leftover file from a crash is
//! reclaimed when its process is gone.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};

/// Holds the PID file for the lifetime of the daemon.
///
/// The file is removed again on drop.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims the PID file, refusing if another live instance holds it.
    pub fn create(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();

        match recorded_pid(&path) {
            Some(pid) if process_alive(pid) => {
                return Err(ServerError::already_running(path.to_string_lossy()));
            }
            Some(pid) => {
                warn!(path = %path.display(), pid, "Reclaiming stale PID file");
                fs::remove_file(&path)?;
            }
            None if path.exists() => {
                // Unreadable or garbage content; treat like a stale file.
                warn!(path = %path.display(), "Reclaiming unreadable PID file");
                fs::remove_file(&path)?;
            }
            None => {}
        }

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let pid = process::id();
        fs::write(&path, format!("{}\n", pid))?;
        info!(path = %path.display(), pid, "Claimed PID file");

        Ok(Self { path })
    }

    /// Returns the path of the claimed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the daemon's own process ID.
    pub fn pid(&self) -> u32 {
        process::id()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove PID file"
                );
            } else {
                debug!(path = %self.path.display(), "Removed PID file");
            }
        }
    }
}

/// Reads the PID recorded in an existing file.
///
/// `None` when the file is absent, unreadable, or does not hold a number.
fn recorded_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

/// Signal 0 checks for existence without touching the process.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Without a liveness check, assume the recorded instance is still up.
#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Returns the default PID file path.
///
/// `$XDG_RUNTIME_DIR/termin.pid` when the runtime dir is set, otherwise
/// `/tmp/termin-$UID.pid`.
pub fn default_pid_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("termin.pid")
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/termin-{}.pid", uid))
    }
}
