//! Lifecycle and error notifications produced by the engine.
//!
//! The engine never throws across the task boundary; every failure that the
//! application should know about arrives through [`EventSink`], tagged with
//! a code from the table below.

/// Request id used for errors that do not belong to any request.
pub const NO_VALID_ID: i32 = -1;

/// A numeric error code paired with its canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: i32,
    pub msg: &'static str,
}

pub const ALREADY_CONNECTED: ErrorCode = ErrorCode {
    code: 501,
    msg: "Already connected.",
};
pub const CONNECT_FAIL: ErrorCode = ErrorCode {
    code: 502,
    msg: "Couldn't connect to the gateway.",
};
pub const NOT_CONNECTED: ErrorCode = ErrorCode {
    code: 504,
    msg: "Not connected.",
};
pub const UNSUPPORTED_VERSION: ErrorCode = ErrorCode {
    code: 506,
    msg: "Unsupported version.",
};
pub const BAD_LENGTH: ErrorCode = ErrorCode {
    code: 507,
    msg: "Bad message length.",
};
pub const SOCKET_EXCEPTION: ErrorCode = ErrorCode {
    code: 509,
    msg: "Exception caught while reading socket - ",
};
pub const FAIL_CREATE_SOCK: ErrorCode = ErrorCode {
    code: 520,
    msg: "Failed to create socket.",
};

/// Callback sink for connection lifecycle notifications.
///
/// Implementations are invoked from both the caller's task and the reader
/// task, so they must be `Send + Sync` and should return quickly.
pub trait EventSink: Send + Sync {
    /// A connection-level error. `request_id` is [`NO_VALID_ID`] for errors
    /// not tied to a specific request.
    fn on_error(&self, request_id: i32, code: i32, message: &str);

    /// The gateway closed the connection (end of stream on read).
    fn on_connection_closed(&self);
}
