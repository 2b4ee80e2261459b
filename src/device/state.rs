//! Device availability state
//!
//! The same four states are used for the registry projection of a device and
//! as the answer to status queries about a session.

use std::fmt;

/// Availability of a renderer device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Not currently discovered
    Down,
    /// Discovered, no session attached
    Ready,
    /// A session is starting a pipeline for the device
    Initializing,
    /// A session is streaming to the device
    Running,
}

impl DeviceState {
    /// Wire name used by the status protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Down => "down",
            DeviceState::Ready => "ready",
            DeviceState::Initializing => "init",
            DeviceState::Running => "run",
        }
    }

    /// Whether a session currently holds the device
    pub fn is_busy(&self) -> bool {
        matches!(self, DeviceState::Initializing | DeviceState::Running)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
