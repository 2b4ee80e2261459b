//! Streaming sessions
//!
//! A session ties one renderer device to one media pipeline for as long as a
//! consumer is expected to pull the stream.

pub mod state;
pub mod store;

pub use state::{SessionId, SessionPhase, SessionRecord};
pub use store::SessionStore;
