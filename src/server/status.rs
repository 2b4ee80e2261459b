//! Status protocol listener
//!
//! Plain-text, line-oriented, one TCP connection per client:
//!
//! ```text
//! > status:9236\r\n
//! < init\r\n
//! > status:9236\r\n
//! < run\r\n
//! ```
//!
//! Anything other than `status:<id>`, including a line longer than
//! [`MAX_REQUEST_LINE`], closes the connection. Every query also counts as a
//! liveness signal for the session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::coordinator::SessionCoordinator;
use crate::device::DeviceState;
use crate::engine::MediaEngine;
use crate::server::config::ServerConfig;
use crate::session::SessionId;

/// Longest request line accepted, terminator excluded
pub const MAX_REQUEST_LINE: usize = 256;

/// A parsed status request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRequest {
    /// Query for a session; None when the ID is not a number
    Status(Option<SessionId>),
}

/// Parse one request line (without its terminator)
pub fn parse_status_request(line: &str) -> Option<StatusRequest> {
    let id = line.strip_prefix("status:")?;
    if id.contains(':') {
        return None;
    }
    Some(StatusRequest::Status(id.parse().ok()))
}

/// Serve one status connection until EOF, a bad line or an I/O error
pub async fn serve_connection<S, E>(stream: S, coordinator: &SessionCoordinator<E>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: MediaEngine,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_REQUEST_LINE));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::debug!(max = MAX_REQUEST_LINE, "Status request too long, closing");
                return Ok(());
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };

        let state = match parse_status_request(&line) {
            Some(StatusRequest::Status(Some(id))) => coordinator.query_status(id).await,
            Some(StatusRequest::Status(None)) => DeviceState::Down,
            None => {
                tracing::debug!(line = %line, "Unrecognized status request, closing");
                return Ok(());
            }
        };

        writer.write_all(format!("{}\r\n", state).as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Status protocol server
pub struct StatusServer<E: MediaEngine> {
    config: ServerConfig,
    coordinator: Arc<SessionCoordinator<E>>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<E: MediaEngine> StatusServer<E> {
    /// Create a new status server
    pub fn new(config: ServerConfig, coordinator: Arc<SessionCoordinator<E>>) -> Self {
        let connection_semaphore = if config.max_status_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_status_connections)))
        } else {
            None
        };

        Self {
            config,
            coordinator,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "Status server listening");
        }

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept status connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Status connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New status connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let coordinator = Arc::clone(&self.coordinator);

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = serve_connection(socket, &coordinator).await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Status connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Status connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        if self.config.tcp_keepalive {
            SockRef::from(socket).set_keepalive(true)?;
        }
        Ok(())
    }
}
