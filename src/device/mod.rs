//! Renderer devices and their availability

pub mod registry;
pub mod state;

pub use registry::{DeviceEntry, DeviceInfo, DeviceRegistry};
pub use state::DeviceState;
