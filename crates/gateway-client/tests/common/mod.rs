//! Shared helpers for the integration tests: a recording event sink, a
//! minimal content decoder, and byte-level utilities for playing the
//! gateway side of the wire.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use gateway_client::decoder::{FrameProbe, MessageDecoder, Probe};
use gateway_client::events::EventSink;
use gateway_client::GatewayConnection;

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Event sink that records everything for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<(i32, i32, String)>>,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<(i32, i32, String)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn has_code(&self, code: i32) -> bool {
        self.errors.lock().unwrap().iter().any(|e| e.1 == code)
    }

    pub fn connection_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl EventSink for RecordingSink {
    fn on_error(&self, request_id: i32, code: i32, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((request_id, code, message.to_string()));
    }

    fn on_connection_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Content decoder for the test dialect.
///
/// The first message of a session is the gateway's handshake answer:
/// either `"{version} {server_time}"` or a redirect instruction
/// `"@{host}:{port}"`. Every later message is recorded verbatim.
pub struct TestDecoder {
    conn: GatewayConnection,
    pub messages: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TestDecoder {
    pub fn new(conn: GatewayConnection) -> Self {
        Self {
            conn,
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn collected(&self) -> Vec<Vec<u8>> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageDecoder for TestDecoder {
    fn apply(&mut self, msg: &[u8]) -> usize {
        if self.conn.server_version() == 0 {
            let text = String::from_utf8_lossy(msg);
            let text = text.trim_end_matches(['\n', '\0']);

            if let Some(endpoint) = text.strip_prefix('@') {
                let (host, port) = endpoint.split_once(':').expect("redirect endpoint");
                self.conn.redirect(host, port.parse().expect("redirect port"));
                return msg.len();
            }

            let (version, time) = text.split_once(' ').unwrap_or((text, ""));
            let version: i32 = version.parse().expect("version ack");
            self.conn.on_version_received(version, time);
            return msg.len();
        }

        self.messages.lock().unwrap().push(msg.to_vec());
        msg.len()
    }
}

/// Boundary probe for the legacy test dialect: newline-delimited messages.
pub struct LineProbe;

impl FrameProbe for LineProbe {
    fn probe(&self, buf: &[u8]) -> Probe {
        match buf.iter().position(|&b| b == b'\n') {
            Some(i) => Probe::Complete(i + 1),
            None => Probe::Incomplete,
        }
    }
}

/// Wrap a payload in a length-prefixed frame.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

pub async fn send_frame(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(&frame(payload)).await.unwrap();
    stream.flush().await.unwrap();
}

/// Consume the client's length-prefixed connect preamble and return the
/// advertised version-range string.
pub async fn read_connect_preamble(stream: &mut TcpStream) -> String {
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic).await.unwrap();
    assert_eq!(&magic, gateway_protocol::HANDSHAKE_MAGIC);

    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.unwrap();

    let mut range = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut range).await.unwrap();
    String::from_utf8(range).unwrap()
}

/// Consume the client's legacy connect preamble (NUL-terminated version).
pub async fn read_legacy_preamble(stream: &mut TcpStream) -> i32 {
    let mut bytes = Vec::new();
    loop {
        let b = stream.read_u8().await.unwrap();
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    String::from_utf8(bytes).unwrap().parse().unwrap()
}

/// Read one length-prefixed frame from the client.
pub async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.unwrap();
    let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}
