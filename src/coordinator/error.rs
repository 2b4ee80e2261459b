//! Coordinator error types

use crate::engine::EngineError;
use crate::session::SessionId;

/// Error type for session creation and stream access
#[derive(Debug)]
pub enum SessionError {
    /// Device unknown, down or already backing a session
    DeviceUnavailable(String),
    /// The media engine failed to start the pipeline
    PipelineStart(EngineError),
    /// The session was deactivated while its pipeline was starting
    Cancelled(SessionId),
    /// No such resource is published
    ResourceNotFound(String),
    /// Another consumer is already reading the resource
    ReaderBusy(SessionId),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::DeviceUnavailable(usn) => write!(f, "Device not available: {}", usn),
            SessionError::PipelineStart(e) => write!(f, "Pipeline start failed: {}", e),
            SessionError::Cancelled(id) => write!(f, "Session {} cancelled during startup", id),
            SessionError::ResourceNotFound(name) => write!(f, "Resource not found: {}", name),
            SessionError::ReaderBusy(id) => write!(f, "Session {} already has a reader", id),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::PipelineStart(e) => Some(e),
            _ => None,
        }
    }
}
