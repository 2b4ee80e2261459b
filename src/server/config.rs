//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default port of the HTTP control and streaming server
pub const DEFAULT_HTTP_PORT: u16 = 7070;

/// Default port of the status protocol
pub const DEFAULT_STATUS_PORT: u16 = 3221;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the HTTP server (control, listing, streams)
    pub http_addr: SocketAddr,

    /// Address of the status protocol listener
    pub status_addr: SocketAddr,

    /// Maximum concurrent status connections (0 = unlimited)
    pub max_status_connections: usize,

    /// Enable TCP_NODELAY on status connections
    pub tcp_nodelay: bool,

    /// Enable TCP keepalive on status connections
    pub tcp_keepalive: bool,

    /// Periodic discovery interval (None = only on demand)
    pub discovery_interval: Option<Duration>,

    /// Read size for streaming responses
    pub stream_chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            status_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_STATUS_PORT)),
            max_status_connections: 0, // Unlimited
            tcp_nodelay: true,
            tcp_keepalive: true,
            discovery_interval: Some(Duration::from_secs(60)),
            stream_chunk_size: 32 * 1024, // 32KB
        }
    }
}

impl ServerConfig {
    /// Set the HTTP address
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set the status protocol address
    pub fn status_addr(mut self, addr: SocketAddr) -> Self {
        self.status_addr = addr;
        self
    }

    /// Set maximum status connections
    pub fn max_status_connections(mut self, max: usize) -> Self {
        self.max_status_connections = max;
        self
    }

    /// Set the periodic discovery interval (zero disables it)
    pub fn discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = if interval.is_zero() { None } else { Some(interval) };
        self
    }

    /// Set the streaming read size
    pub fn stream_chunk_size(mut self, size: usize) -> Self {
        self.stream_chunk_size = size.max(1);
        self
    }

    /// Port advertised to control clients for status queries
    pub fn health_port(&self) -> u16 {
        self.status_addr.port()
    }
}
