//! Interfaces to the external message-content decoder.
//!
//! The engine frames bytes; it never interprets them. Content decoding is
//! split into two narrow roles:
//!
//! - [`FrameProbe`] answers "how many bytes does one message span, if any
//!   are complete yet" over accumulated bytes. Only legacy framing needs
//!   it, since that mode has no length header. The probe runs on the
//!   reader task and must not invoke application callbacks.
//! - [`MessageDecoder`] consumes one queued message at a time on the
//!   caller's task, dispatching typed callbacks as it sees fit, and reports
//!   how many bytes it consumed.

/// Result of probing accumulated bytes for one message boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// No complete message yet; keep reading.
    Incomplete,
    /// The next message spans exactly this many bytes.
    Complete(usize),
}

/// Pure boundary probe for legacy self-delimiting framing.
pub trait FrameProbe: Send + Sync {
    fn probe(&self, buf: &[u8]) -> Probe;
}

/// Content decoder draining queued messages.
///
/// `apply` receives exactly one framed message (header already stripped)
/// and returns the number of bytes it consumed. Returning 0 tells the
/// engine the message was not useful standalone and stops the current
/// drain batch.
pub trait MessageDecoder {
    fn apply(&mut self, msg: &[u8]) -> usize;
}
