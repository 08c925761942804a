//! Length-prefix framing helpers.
//!
//! Framing model (length-prefixed mode):
//!
//! ```text
//! [0..4] : payload length (u32 BE), excluding the header itself
//! [4..]  : payload bytes
//! ```
//!
//! Outbound messages are built with a zeroed 4-byte reserved region up
//! front (see [`prepare_frame`]); [`encode_frame_len`] patches the real
//! length in just before the bytes are handed to the socket. Requests that
//! carry transport-level preamble ahead of the frame pass a non-zero
//! `offset` so the header lands past it.
//!
//! Legacy mode has no header at all; message boundaries are discovered by
//! probing accumulated content, which is the reader's job, not this
//! crate's.

use std::fmt;

use crate::constants::{HEADER_LEN, MAX_MSG_LEN};

/// Errors that can arise when framing a message.
#[derive(Debug, PartialEq, Eq)]
pub enum FramingError {
    /// Buffer too short to hold the reserved header at the given offset.
    Truncated,
    /// Payload longer than [`MAX_MSG_LEN`].
    LengthExceeded(usize),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::Truncated => write!(f, "Buffer too short for frame header"),
            FramingError::LengthExceeded(len) => {
                write!(f, "Payload length {} exceeds maximum {}", len, MAX_MSG_LEN)
            }
        }
    }
}

impl std::error::Error for FramingError {}

/// Append the zeroed reserved header region to an outbound buffer.
///
/// Call this before serializing the payload so [`encode_frame_len`] has
/// somewhere to write the final length.
pub fn prepare_frame(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&[0u8; HEADER_LEN]);
}

/// Patch the big-endian payload length into the reserved header region at
/// `offset`.
///
/// The payload is everything past `offset + HEADER_LEN`. Fails without
/// touching the buffer if the payload would exceed [`MAX_MSG_LEN`] or the
/// buffer cannot hold a header at `offset`.
pub fn encode_frame_len(msg: &mut [u8], offset: usize) -> Result<(), FramingError> {
    if msg.len() < offset + HEADER_LEN {
        return Err(FramingError::Truncated);
    }

    let len = msg.len() - HEADER_LEN - offset;
    if len > MAX_MSG_LEN {
        return Err(FramingError::LengthExceeded(len));
    }

    let netlen = (len as u32).to_be_bytes();
    msg[offset..offset + HEADER_LEN].copy_from_slice(&netlen);

    Ok(())
}

/// Interpret a frame header as the payload length it announces.
pub fn frame_len(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}
