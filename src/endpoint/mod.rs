//! Streaming resource endpoints
//!
//! Every session with a running pipeline is reachable at one ephemeral
//! resource, `/{kind}{id}.mp4`. This module keeps the table of published
//! resources and the live-stream contract they follow; the HTTP handlers
//! serving them live in [`crate::server::stream`].

pub mod live;
pub mod table;

pub use live::{live_seek, LIVE_CONTENT_LENGTH};
pub use table::{EndpointTable, ResourceName};
