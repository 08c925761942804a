//! Wire-level constants shared by both ends of the gateway protocol.
//!
//! The actual framing logic lives in [`crate::framing`]; the handshake
//! preamble in [`crate::handshake`].

/// Size in bytes of the length header prepended to each frame in
/// length-prefixed mode.
pub const HEADER_LEN: usize = 4;

/// Maximum payload length of a single frame (16 MiB minus one byte).
///
/// A local request exceeding this is rejected before any bytes hit the wire;
/// an inbound frame claiming more than this is treated as corruption and
/// ends the connection.
pub const MAX_MSG_LEN: usize = 0xFF_FFFF;

/// Lowest gateway version a legacy-framing session will talk to.
pub const MIN_VERSION_LEGACY: i32 = 40;

/// Version range negotiable under length-prefixed framing.
///
/// The connect preamble advertises exactly this range; a gateway answering
/// with anything outside it is an unsupported dialect.
pub const MIN_VERSION_FRAMED: i32 = 100;
pub const MAX_VERSION_FRAMED: i32 = 150;

/// How many redirect instructions a single connect attempt will follow
/// before giving up.
pub const REDIRECT_COUNT_MAX: u32 = 2;

/// Starting capacity of the inbound accumulator on the reader side.
///
/// Under legacy framing the accumulator doubles past this when a message
/// outgrows it, then compacts back down once drained.
pub const DEFAULT_BUF_CAPACITY: usize = 8192;
