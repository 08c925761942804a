//! gateway-protocol
//!
//! Byte-level primitives for the trading-gateway wire protocol.
//!
//! This crate knows how bytes are framed on the wire; it deliberately knows
//! nothing about message *content*, sockets, or threading. The connection
//! engine in `gateway-client` builds on it.
//!
//! - [`constants`] : header sizes, message limits, version bounds
//! - [`framing`]   : length-prefix header encode/decode
//! - [`handshake`] : the connect/version-negotiation preamble

pub mod constants;
pub mod framing;
pub mod handshake;

pub use constants::{
    DEFAULT_BUF_CAPACITY, HEADER_LEN, MAX_MSG_LEN, MAX_VERSION_FRAMED, MIN_VERSION_FRAMED,
    MIN_VERSION_LEGACY, REDIRECT_COUNT_MAX,
};
pub use framing::{encode_frame_len, frame_len, prepare_frame, FramingError};
pub use handshake::{connect_request, FramingMode, HANDSHAKE_MAGIC};
