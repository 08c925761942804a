//! The connect/version-negotiation preamble.
//!
//! Immediately after the TCP connect, the client advertises which protocol
//! versions it speaks. The gateway answers with the version it picked plus
//! its local time; that answer travels as an ordinary frame and is decoded
//! by the content layer, not here.
//!
//! Preamble layout:
//!
//! ```text
//! Length-prefixed mode
//! --------------------
//! [0..4] : magic "GWY\0"
//! [4..8] : length of the range string (u32 BE)
//! [8..]  : ASCII "v{MIN}..{MAX}"
//!
//! Legacy mode
//! -----------
//! ASCII client version, NUL-terminated (e.g. "40\0")
//! ```

use crate::constants::{MAX_VERSION_FRAMED, MIN_VERSION_FRAMED, MIN_VERSION_LEGACY};

/// Magic tag opening the length-prefixed connect preamble.
pub const HANDSHAKE_MAGIC: &[u8; 4] = b"GWY\0";

/// Framing discipline for a session, fixed per connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Modern 4-byte length header per frame.
    LengthPrefixed,
    /// Historical fallback: boundaries discovered by content probing.
    Legacy,
}

/// Build the version-advertisement bytes sent right after TCP connect.
pub fn connect_request(mode: FramingMode) -> Vec<u8> {
    match mode {
        FramingMode::LengthPrefixed => {
            let range = format!("v{}..{}", MIN_VERSION_FRAMED, MAX_VERSION_FRAMED);
            let mut out = Vec::with_capacity(HANDSHAKE_MAGIC.len() + 4 + range.len());
            out.extend_from_slice(HANDSHAKE_MAGIC);
            out.extend_from_slice(&(range.len() as u32).to_be_bytes());
            out.extend_from_slice(range.as_bytes());
            out
        }
        FramingMode::Legacy => {
            let mut out = MIN_VERSION_LEGACY.to_string().into_bytes();
            out.push(0);
            out
        }
    }
}
