//! Network servers
//!
//! Two listeners share one [`SessionCoordinator`](crate::coordinator::SessionCoordinator):
//! the HTTP server (device listing, control API, streaming resources) and
//! the plain-text status protocol.

pub mod config;
pub mod http;
pub mod interface;
pub mod status;
pub mod stream;

pub use config::ServerConfig;
pub use http::{router, AppState};
pub use interface::{interface_ipv4, InterfaceError};
pub use status::StatusServer;
