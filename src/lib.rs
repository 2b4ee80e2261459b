//! live-media-rs: live camera streaming to DLNA media renderers
//!
//! A client asks for a camera to be played on a renderer. The coordinator
//! reserves the renderer, starts an encoding pipeline and publishes an MP4
//! resource; the renderer is told to pull it over HTTP; a status port
//! reports how far the session got.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use live_media_rs::{
//!     router, AppState, GstLaunchConfig, GstLaunchEngine, Reconciler, SessionCoordinator,
//!     SsdpConfig, SsdpDiscovery,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = GstLaunchEngine::new(GstLaunchConfig::default());
//!     let coordinator = Arc::new(SessionCoordinator::new(engine));
//!     let discovery = SsdpDiscovery::new(SsdpConfig::default())?;
//!     let reconciler = Arc::new(Reconciler::new(Arc::clone(&coordinator), discovery));
//!     reconciler.reconcile_once().await?;
//!
//!     let app = router(AppState {
//!         coordinator,
//!         reconciler,
//!         health_port: 3221,
//!         stream_chunk_size: 32 * 1024,
//!     });
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:7070").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod device;
pub mod discovery;
pub mod endpoint;
pub mod engine;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{CoordinatorConfig, SessionCoordinator, SessionError};
pub use device::{DeviceInfo, DeviceState};
pub use discovery::{Discovery, DiscoveryError, Reconciler, SsdpConfig, SsdpDiscovery};
pub use endpoint::ResourceName;
pub use engine::{EngineError, GstLaunchConfig, GstLaunchEngine, MediaEngine, Pipeline, PipelineRequest};
pub use server::{router, AppState, ServerConfig, StatusServer};
pub use session::SessionId;
