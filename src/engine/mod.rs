//! Media engine boundary
//!
//! The coordinator never encodes anything itself. It asks a [`MediaEngine`]
//! to start a pipeline for a session and gets back an opaque [`Pipeline`]
//! handle it can read muxed bytes from and destroy when the session ends.
//! Implementations may run in-process, in a child process or remotely.

pub mod gst;

use std::future::Future;
use std::io;

use crate::session::SessionId;

pub use gst::{GstLaunchConfig, GstLaunchEngine, GstPipeline};

/// Parameters for starting a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Session the pipeline belongs to
    pub session_id: SessionId,
    /// USN of the renderer the stream is destined for
    pub device: String,
    /// Endpoint kind (selects the pipeline source)
    pub kind: String,
    /// URL the renderer will pull the stream from
    pub destination_url: String,
}

/// Starts pipelines
pub trait MediaEngine: Send + Sync + 'static {
    /// Handle to one running pipeline
    type Pipeline: Pipeline;

    /// Start a pipeline for a session
    ///
    /// May take a while; callers must not hold shared locks across it.
    fn start(
        &self,
        request: &PipelineRequest,
    ) -> impl Future<Output = Result<Self::Pipeline, EngineError>> + Send;
}

/// A running pipeline
///
/// Only one task reads a pipeline at a time. `destroy` may run concurrently
/// with a read; the read then fails or reports end of stream.
pub trait Pipeline: Send + Sync + 'static {
    /// Read muxed bytes into `buf`
    ///
    /// Returns 0 at end of stream.
    fn read(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Tear the pipeline down
    fn destroy(&self) -> impl Future<Output = ()> + Send;
}

/// Error type for pipeline start
#[derive(Debug)]
pub enum EngineError {
    /// No pipeline is defined for this endpoint kind
    UnsupportedKind(String),
    /// The engine process could not be launched
    Spawn(io::Error),
    /// The engine exited during startup
    Exited(Option<i32>),
    /// Any other engine-reported failure
    Failed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnsupportedKind(kind) => write!(f, "Unsupported endpoint kind: {}", kind),
            EngineError::Spawn(e) => write!(f, "Failed to launch pipeline: {}", e),
            EngineError::Exited(Some(code)) => {
                write!(f, "Pipeline exited during startup with code {}", code)
            }
            EngineError::Exited(None) => write!(f, "Pipeline killed during startup"),
            EngineError::Failed(msg) => write!(f, "Pipeline failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}
