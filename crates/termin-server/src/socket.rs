//! Unix socket front door.
//!
//! The web backend opens a connection per booking interaction, sends one or
//! more framed requests and reads the framed responses. Concurrency is
//! capped with a semaphore so a misbehaving backend cannot pile up tasks,
//! and every read and write runs under the connection deadline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use termin_protocol::{
    Envelope, MAX_MESSAGE_SIZE, PROTOCOL_VERSION, ProtocolError, Request, Response,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Listening side of the booking IPC.
pub struct SocketServer {
    socket_path: PathBuf,
    connection_timeout: Duration,
    listener: UnixListener,
    limiter: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the daemon socket described by the configuration.
    ///
    /// A leftover socket file from a crashed instance is reclaimed when
    /// `cleanup_stale_socket` is set and nothing answers on it; a live
    /// socket always wins and binding fails.
    pub async fn bind(config: &ServerConfig) -> ServerResult<Self> {
        let socket_path = config.socket_path.clone();

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        claim_socket_path(&socket_path, config.cleanup_stale_socket).await?;

        let listener = UnixListener::bind(&socket_path)?;
        info!(path = %socket_path.display(), "Listening for booking requests");

        Ok(Self {
            socket_path,
            connection_timeout: config.connection_timeout,
            listener,
            limiter: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Returns the bound socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Waits for the next client, blocking while the connection cap is hit.
    async fn accept(&self) -> ServerResult<Connection> {
        let permit = self.limiter.clone().acquire_owned().await;
        let permit = permit.expect("semaphore should not be closed");

        let (stream, _addr) = self.listener.accept().await?;
        debug!("Accepted booking client");

        Ok(Connection {
            stream,
            deadline: self.connection_timeout,
            _permit: permit,
        })
    }

    /// Serves connections until the shutdown future resolves.
    ///
    /// Each accepted connection runs in its own task; accept failures are
    /// logged and the loop keeps going.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        S: std::future::Future<Output = ()> + Send,
    {
        let accept_loop = async {
            loop {
                match self.accept().await {
                    Ok(connection) => {
                        tokio::spawn(handler(connection));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
        };

        tokio::select! {
            _ = accept_loop => unreachable!("accept loop never returns"),
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

/// Removes a dead socket file, or refuses to bind over a live one.
async fn claim_socket_path(path: &Path, cleanup: bool) -> ServerResult<()> {
    if !path.exists() {
        return Ok(());
    }
    if !cleanup {
        return Err(ServerError::socket_in_use(
            path.to_string_lossy().to_string(),
        ));
    }

    // Only a connect attempt distinguishes a crashed instance's leftover
    // from a running one.
    match UnixStream::connect(path).await {
        Ok(_) => Err(ServerError::socket_in_use(
            path.to_string_lossy().to_string(),
        )),
        Err(_) => {
            info!(path = %path.display(), "Reclaiming dead socket file");
            std::fs::remove_file(path)?;
            Ok(())
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    path = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            } else {
                debug!(path = %self.socket_path.display(), "Removed socket file");
            }
        }
    }
}

/// One accepted client connection.
///
/// Holds its semaphore permit for as long as it lives, so dropping the
/// connection frees a slot.
pub struct Connection {
    stream: UnixStream,
    deadline: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads the next request envelope.
    ///
    /// Returns `Ok(None)` when the client hung up cleanly between frames.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let mut prefix = [0u8; 4];
        match tokio::time::timeout(self.deadline, self.stream.read_exact(&mut prefix)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timeout_error("read request length")),
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len == 0 {
            return Err(ServerError::Protocol(ProtocolError::EmptyMessage));
        }
        if len > MAX_MESSAGE_SIZE as usize {
            return Err(ServerError::Protocol(ProtocolError::MessageTooLarge {
                size: len as u32,
                max: MAX_MESSAGE_SIZE,
            }));
        }

        let mut payload = vec![0u8; len];
        match tokio::time::timeout(self.deadline, self.stream.read_exact(&mut payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timeout_error("read request payload")),
        }

        let envelope: Envelope<Request> = termin_protocol::decode_payload(&payload)?;

        if !envelope.is_compatible() {
            warn!(
                version = %envelope.protocol_version,
                expected = %PROTOCOL_VERSION,
                "Incompatible protocol version"
            );
        }

        Ok(Some(envelope))
    }

    /// Writes a response envelope as one frame.
    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        let frame = termin_protocol::encode_message(envelope)?;

        match tokio::time::timeout(self.deadline, self.stream.write_all(&frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(timeout_error("write response")),
        }
    }

    /// Answers the request with the given payload.
    pub async fn respond(
        &mut self,
        request_id: impl Into<String>,
        response: Response,
    ) -> ServerResult<()> {
        let envelope = Envelope::response(request_id, response);
        self.write_response(&envelope).await
    }
}

fn timeout_error(operation: &str) -> ServerError {
    ServerError::Protocol(ProtocolError::Timeout {
        operation: operation.to_string(),
    })
}
