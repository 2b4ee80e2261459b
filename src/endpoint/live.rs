//! Live resource contract
//!
//! A live camera has no total length and no byte ranges. Clients that probe
//! the length by seeking to the end get a fixed large sentinel instead.

use std::io::SeekFrom;

/// Length reported for a live resource (2^31 bytes)
pub const LIVE_CONTENT_LENGTH: u64 = 1 << 31;

/// Media type of every streaming resource
pub const CONTENT_TYPE: &str = "video/mp4";

/// DLNA profile and flags: AVC baseline MP4, no seek, streaming transfer
pub const DLNA_CONTENT_FEATURES: &str = "DLNA.ORG_PN=AVC_MP4_BL_CIF15_AAC_520;DLNA.ORG_OP=00;DLNA.ORG_CI=1;DLNA.ORG_FLAGS=05700000000000000000000000000000";

/// DLNA transfer mode
pub const DLNA_TRANSFER_MODE: &str = "Streaming";

/// Protocol info advertised to renderers in DIDL-Lite metadata
pub fn protocol_info() -> String {
    format!("http-get:*:{}:{}", CONTENT_TYPE, DLNA_CONTENT_FEATURES)
}

/// Seek on a live resource
///
/// Seeking from the end reports [`LIVE_CONTENT_LENGTH`]; every other seek is
/// a no-op at position 0. Never fails.
pub fn live_seek(pos: SeekFrom) -> u64 {
    match pos {
        SeekFrom::End(_) => LIVE_CONTENT_LENGTH,
        SeekFrom::Start(_) | SeekFrom::Current(_) => 0,
    }
}

/// Length a client observes when probing the resource
pub fn probed_length() -> u64 {
    live_seek(SeekFrom::End(0))
}
