//! Renderer discovery and control
//!
//! The coordinator only needs two things from the network: the current set
//! of media renderers, and a way to tell a renderer to pull a stream URL.
//! [`Discovery`] is that boundary; [`SsdpDiscovery`] implements it with SSDP
//! search, UPnP device descriptions and AVTransport SOAP actions.

pub mod avtransport;
pub mod description;
pub mod reconciler;
pub mod ssdp;

use std::future::Future;

use crate::device::DeviceInfo;

pub use reconciler::Reconciler;
pub use ssdp::{SsdpConfig, SsdpDiscovery};

/// Discovery collaborator
pub trait Discovery: Send + Sync + 'static {
    /// Enumerate the renderers currently visible on the network
    fn scan(&self) -> impl Future<Output = Result<Vec<DeviceInfo>, DiscoveryError>> + Send;

    /// Ask a renderer to load and play a stream URL
    fn play(&self, usn: &str, url: &str) -> impl Future<Output = Result<(), DiscoveryError>> + Send;
}

/// Error type for discovery and renderer control
#[derive(Debug)]
pub enum DiscoveryError {
    /// Socket error during search
    Io(std::io::Error),
    /// HTTP error talking to a renderer
    Http(reqwest::Error),
    /// Renderer has not been seen by a scan
    UnknownRenderer(String),
    /// Renderer does not expose an AVTransport service
    NoAvTransport(String),
    /// Renderer rejected a SOAP action
    ActionFailed {
        /// SOAP action name
        action: String,
        /// HTTP status returned
        status: u16,
    },
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::Io(e) => write!(f, "Discovery I/O error: {}", e),
            DiscoveryError::Http(e) => write!(f, "Renderer HTTP error: {}", e),
            DiscoveryError::UnknownRenderer(usn) => write!(f, "Unknown renderer: {}", usn),
            DiscoveryError::NoAvTransport(usn) => {
                write!(f, "Renderer has no AVTransport service: {}", usn)
            }
            DiscoveryError::ActionFailed { action, status } => {
                write!(f, "{} failed with HTTP {}", action, status)
            }
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryError::Io(e) => Some(e),
            DiscoveryError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DiscoveryError {
    fn from(e: std::io::Error) -> Self {
        DiscoveryError::Io(e)
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        DiscoveryError::Http(e)
    }
}
