//! Session state machine
//!
//! Tracks one streaming session from pipeline start to teardown:
//! `Initializing -> Running -> removed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::device::DeviceState;

/// Process-wide session identifier
pub type SessionId = u64;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Pipeline is being started, nobody is reading yet
    Initializing,
    /// A consumer is pulling bytes
    Running,
}

impl SessionPhase {
    /// Device state mirrored by this phase
    pub fn device_state(&self) -> DeviceState {
        match self {
            SessionPhase::Initializing => DeviceState::Initializing,
            SessionPhase::Running => DeviceState::Running,
        }
    }
}

/// Complete session record
#[derive(Debug)]
pub struct SessionRecord<P> {
    /// Unique session ID
    pub id: SessionId,

    /// USN of the device backing this session
    pub device: String,

    /// Requested endpoint kind (e.g. "camera")
    pub kind: String,

    /// Current phase
    pub phase: SessionPhase,

    /// Pipeline handle, set once the engine has started it
    pub pipeline: Option<Arc<P>>,

    /// Whether a consumer currently owns the pipeline reader
    pub reader_claimed: bool,

    /// When the session was created
    pub created_at: Instant,

    /// Last liveness signal (creation or status query)
    pub last_seen: Instant,
}

impl<P> SessionRecord<P> {
    /// Create a new record in the `Initializing` phase
    pub fn new(id: SessionId, device: impl Into<String>, kind: impl Into<String>) -> Self {
        let now = Instant::now();

        Self {
            id,
            device: device.into(),
            kind: kind.into(),
            phase: SessionPhase::Initializing,
            pipeline: None,
            reader_claimed: false,
            created_at: now,
            last_seen: now,
        }
    }

    /// Transition to `Running`
    ///
    /// Returns true if the phase changed.
    pub fn activate(&mut self) -> bool {
        if self.phase == SessionPhase::Running {
            return false;
        }
        self.phase = SessionPhase::Running;
        true
    }

    /// Record a liveness signal
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Time since the last liveness signal
    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    /// Session age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
