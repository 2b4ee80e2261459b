//! Device registry
//!
//! Projection of which renderers are discovered and which are busy. The
//! registry holds no lock of its own; the coordinator owns it behind the
//! shared session lock.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Serialize;

use super::state::DeviceState;

/// A discovered renderer as reported by the discovery collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Friendly name shown to users
    pub name: String,
    /// Unique service name assigned by discovery
    pub usn: String,
}

impl DeviceInfo {
    /// Create a new device description
    pub fn new(usn: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usn: usn.into(),
        }
    }
}

/// Entry for a single known device
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    /// Last reported friendly name
    pub name: String,
    /// Current availability
    pub state: DeviceState,
}

/// Map of USN to device entry
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a discovery snapshot
    ///
    /// Devices in the snapshot that were `Down` (or unknown) become `Ready`.
    /// Known devices missing from the snapshot become `Down`, even when a
    /// session is using them.
    pub fn reconcile(&mut self, discovered: &[DeviceInfo]) {
        let seen: HashSet<&str> = discovered.iter().map(|d| d.usn.as_str()).collect();

        for device in discovered {
            match self.devices.get_mut(&device.usn) {
                Some(entry) => {
                    entry.name = device.name.clone();
                    if entry.state == DeviceState::Down {
                        entry.state = DeviceState::Ready;
                        tracing::info!(usn = %device.usn, name = %device.name, "Device back up");
                    }
                }
                None => {
                    self.devices.insert(
                        device.usn.clone(),
                        DeviceEntry {
                            name: device.name.clone(),
                            state: DeviceState::Ready,
                        },
                    );
                    tracing::info!(usn = %device.usn, name = %device.name, "Device discovered");
                }
            }
        }

        for (usn, entry) in self.devices.iter_mut() {
            if seen.contains(usn.as_str()) || entry.state == DeviceState::Down {
                continue;
            }

            if entry.state.is_busy() {
                tracing::warn!(usn = %usn, state = %entry.state, "Busy device missing from discovery, marking down");
            } else {
                tracing::info!(usn = %usn, "Device gone");
            }
            entry.state = DeviceState::Down;
        }
    }

    /// Check if a device is discovered and free
    pub fn is_available(&self, usn: &str) -> bool {
        self.state(usn) == DeviceState::Ready
    }

    /// Current state of a device (`Down` if unknown)
    pub fn state(&self, usn: &str) -> DeviceState {
        self.devices
            .get(usn)
            .map(|entry| entry.state)
            .unwrap_or(DeviceState::Down)
    }

    /// Record a coordinator-driven transition
    ///
    /// Unknown devices are added with an empty name.
    pub fn set_state(&mut self, usn: &str, state: DeviceState) {
        match self.devices.get_mut(usn) {
            Some(entry) => entry.state = state,
            None => {
                self.devices.insert(
                    usn.to_string(),
                    DeviceEntry {
                        name: String::new(),
                        state,
                    },
                );
            }
        }
    }

    /// Snapshot of every known device
    pub fn snapshot(&self) -> Vec<(DeviceInfo, DeviceState)> {
        let mut devices: Vec<_> = self
            .devices
            .iter()
            .map(|(usn, entry)| (DeviceInfo::new(usn.clone(), entry.name.clone()), entry.state))
            .collect();
        devices.sort_by(|a, b| a.0.usn.cmp(&b.0.usn));
        devices
    }

    /// Number of known devices, discovered or not
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device has ever been seen
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
