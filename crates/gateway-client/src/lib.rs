//! gateway-client
//!
//! Client-side connection and framing engine for the trading-gateway TCP
//! protocol.
//!
//! This crate owns the hard part of talking to a long-lived gateway
//! process: establishing and tearing down the TCP session with version
//! negotiation and redirect handling, assembling raw bytes into discrete
//! messages under two framing disciplines, and handing those messages
//! across a task boundary to a single consumer in wire order.
//!
//! Message *content* is out of scope. The engine consumes a
//! [`decoder::MessageDecoder`] to drain messages (and a
//! [`decoder::FrameProbe`] to find boundaries in legacy mode) and produces
//! lifecycle notifications through an [`events::EventSink`].
//!
//! Typical wiring:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use gateway_client::{ClientConfig, FrameReader, GatewayConnection, Signal};
//! # use gateway_client::decoder::MessageDecoder;
//! # use gateway_client::events::EventSink;
//! # struct Sink;
//! # impl EventSink for Sink {
//! #     fn on_error(&self, _: i32, _: i32, _: &str) {}
//! #     fn on_connection_closed(&self) {}
//! # }
//! # struct Decoder;
//! # impl MessageDecoder for Decoder {
//! #     fn apply(&mut self, msg: &[u8]) -> usize { msg.len() }
//! # }
//! # async fn run() {
//! let signal = Arc::new(Signal::new());
//! let conn = GatewayConnection::new(ClientConfig::default(), Arc::new(Sink), signal.clone(), None);
//!
//! let mut decoder = Decoder;
//! if conn.connect("127.0.0.1", 4001, 1, false, &mut decoder).await {
//!     let mut reader = FrameReader::new(conn.clone());
//!     reader.start();
//!
//!     while conn.is_socket_ok() {
//!         signal.wait_for_signal(Some(Duration::from_secs(1))).await;
//!         reader.process_msgs(&mut decoder);
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod decoder;
pub mod events;
pub mod queue;
pub mod reader;
pub mod signal;

mod transport;

pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnState, GatewayConnection};
pub use decoder::{FrameProbe, MessageDecoder, Probe};
pub use events::EventSink;
pub use gateway_protocol::FramingMode;
pub use queue::{Message, MessageQueue};
pub use reader::FrameReader;
pub use signal::Signal;
