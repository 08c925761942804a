//! Connection lifecycle state machine.
//!
//! `GatewayConnection` owns the single TCP socket, the session identity,
//! and the connect/redirect/disconnect state machine. It is cheap to clone
//! (shared handle) because both the caller's task and the reader task hold
//! it; all mutation goes through interior locks.
//!
//! Every socket-layer failure funnels through
//! [`GatewayConnection::handle_socket_error`], the single classification
//! chokepoint. Callers never inspect raw OS errors themselves.

use std::io;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use gateway_protocol::handshake::connect_request;
use gateway_protocol::{
    encode_frame_len, prepare_frame, FramingMode, MAX_VERSION_FRAMED, MIN_VERSION_FRAMED,
    MIN_VERSION_LEGACY, REDIRECT_COUNT_MAX,
};

use crate::config::ClientConfig;
use crate::decoder::{FrameProbe, MessageDecoder};
use crate::events::{
    EventSink, ALREADY_CONNECTED, BAD_LENGTH, CONNECT_FAIL, NOT_CONNECTED, NO_VALID_ID,
    SOCKET_EXCEPTION, UNSUPPORTED_VERSION,
};
use crate::queue::MessageQueue;
use crate::reader::{ReadLoop, POLL_TIMEOUT};
use crate::signal::Signal;
use crate::transport::Transport;

/// Connection lifecycle state.
///
/// Transitions happen only inside the connect handshake, on an explicit
/// disconnect, or when the gateway redirects the session elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Redirect,
    Connected,
}

/// Session identity negotiated with the gateway.
#[derive(Debug)]
struct Session {
    host: String,
    port: u16,
    client_id: i32,
    extra_auth: bool,
    server_time: String,
}

impl Session {
    fn new() -> Self {
        Self {
            host: String::new(),
            port: 0,
            client_id: -1,
            extra_auth: false,
            server_time: String::new(),
        }
    }
}

struct Shared {
    framing: FramingMode,
    allow_redirect: bool,
    async_connect: bool,

    state: Mutex<ConnState>,
    session: Mutex<Session>,
    server_version: AtomicI32,
    redirect_count: AtomicU32,

    socket: Mutex<Option<Arc<Transport>>>,
    last_error: Mutex<Option<io::Error>>,

    events: Arc<dyn EventSink>,
    signal: Arc<Signal>,
    probe: Option<Arc<dyn FrameProbe>>,
}

/// Shared handle to one gateway connection.
#[derive(Clone)]
pub struct GatewayConnection {
    shared: Arc<Shared>,
}

impl GatewayConnection {
    /// Build a connection handle.
    ///
    /// `probe` is only consulted under legacy framing, where message
    /// boundaries are discovered by content probing; length-prefixed
    /// sessions may pass `None`.
    pub fn new(
        config: ClientConfig,
        events: Arc<dyn EventSink>,
        signal: Arc<Signal>,
        probe: Option<Arc<dyn FrameProbe>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                framing: config.framing_mode(),
                allow_redirect: config.allow_redirect,
                async_connect: config.async_connect,
                state: Mutex::new(ConnState::Disconnected),
                session: Mutex::new(Session::new()),
                server_version: AtomicI32::new(0),
                redirect_count: AtomicU32::new(0),
                socket: Mutex::new(None),
                last_error: Mutex::new(None),
                events,
                signal,
                probe,
            }),
        }
    }

    /// Establish the session: TCP connect, send the version-negotiation
    /// request, and (unless async-connect is configured) block until the
    /// gateway's version answer has been decoded or the socket dies.
    ///
    /// An empty `host` means loopback. Returns whether the socket ended up
    /// usable. Redirect instructions received during the handshake are
    /// followed here, up to the redirect cap.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
        extra_auth: bool,
        decoder: &mut dyn MessageDecoder,
    ) -> bool {
        if self.is_socket_ok() {
            warn!("connect requested while already connected");
            self.shared
                .events
                .on_error(NO_VALID_ID, ALREADY_CONNECTED.code, ALREADY_CONNECTED.msg);
            return false;
        }

        let host = if host.is_empty() { "127.0.0.1" } else { host };
        {
            let mut session = self.session();
            session.host = host.to_string();
            session.port = port;
            session.client_id = client_id;
            session.extra_auth = extra_auth;
        }
        self.shared.redirect_count.store(0, Ordering::Relaxed);

        loop {
            let ok = self.connect_impl(decoder).await;

            // A redirect updated host/port and dropped the socket; rerun
            // the attempt against the new endpoint.
            if !ok && self.state() == ConnState::Redirect {
                self.set_state(ConnState::Disconnected);
                continue;
            }
            return ok;
        }
    }

    async fn connect_impl(&self, decoder: &mut dyn MessageDecoder) -> bool {
        let (host, port) = {
            let session = self.session();
            (session.host.clone(), session.port)
        };

        info!("connecting to {}:{}", host, port);
        let stream = match TcpStream::connect((host.as_str(), port)).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("connect to {}:{} failed: {}", host, port, e);
                self.shared
                    .events
                    .on_error(NO_VALID_ID, CONNECT_FAIL.code, CONNECT_FAIL.msg);
                return false;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            self.record_error(e);
            self.handle_socket_error();
            return false;
        }

        let transport = Arc::new(Transport::new(stream));
        *self.socket_slot() = Some(transport.clone());

        let request = connect_request(self.shared.framing);
        if let Err(e) = transport.buffered_send(&request) {
            self.record_error(e);
            if !self.handle_socket_error() {
                return false;
            }
        }
        self.set_state(ConnState::Connected);
        debug!("negotiation request sent");

        if !self.shared.async_connect {
            self.pump_handshake(decoder).await;
        }

        self.is_socket_ok()
    }

    /// Drive the framing reader synchronously until the gateway's version
    /// answer lands or the socket becomes invalid.
    async fn pump_handshake(&self, decoder: &mut dyn MessageDecoder) {
        let queue = Arc::new(MessageQueue::new());
        let mut pump = ReadLoop::new(self.clone(), queue.clone());

        pump.put_message_to_queue().await;

        while self.server_version() == 0 && self.is_socket_ok() {
            self.shared.signal.wait_for_signal(Some(POLL_TIMEOUT)).await;

            while let Some(msg) = queue.pop() {
                if decoder.apply(msg.as_bytes()) == 0 {
                    break;
                }
            }

            if self.server_version() == 0 && self.is_socket_ok() {
                pump.put_message_to_queue().await;
            }
        }
    }

    /// Close the socket. With `reset_state` the whole session identity is
    /// cleared as well; without it (the redirect path) host/port and the
    /// negotiated identity survive for the next attempt. Idempotent.
    pub fn disconnect(&self, reset_state: bool) {
        let had_socket = self.socket_slot().take().is_some();
        if had_socket {
            info!("disconnected");
        }

        if reset_state {
            self.shared.server_version.store(0, Ordering::SeqCst);
            {
                let mut session = self.session();
                session.server_time.clear();
                session.client_id = -1;
                session.extra_auth = false;
            }
            self.set_state(ConnState::Disconnected);
        }
    }

    /// Follow a redirect instruction from the gateway's handshake answer.
    ///
    /// Refused (with a connect-failure report) unless redirect-following
    /// is enabled. Exceeding the redirect cap is fatal. Otherwise the new
    /// endpoint replaces the old one, the socket is dropped without
    /// resetting the session identity, and the connect retry loop re-runs
    /// the handshake.
    pub fn redirect(&self, host: &str, port: u16) {
        let host = if host.is_empty() { "127.0.0.1" } else { host };

        let (cur_host, cur_port) = {
            let session = self.session();
            (session.host.clone(), session.port)
        };
        if host == cur_host && (port == 0 || port == cur_port) {
            return;
        }

        if !self.shared.allow_redirect {
            warn!("redirect to {}:{} refused by configuration", host, port);
            self.shared
                .events
                .on_error(NO_VALID_ID, CONNECT_FAIL.code, CONNECT_FAIL.msg);
            self.disconnect(true);
            return;
        }

        {
            let mut session = self.session();
            session.host = host.to_string();
            if port > 0 {
                session.port = port;
            }
        }

        let count = self.shared.redirect_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count > REDIRECT_COUNT_MAX {
            error!("redirect count exceeded ({} > {})", count, REDIRECT_COUNT_MAX);
            self.disconnect(true);
            self.shared
                .events
                .on_error(NO_VALID_ID, CONNECT_FAIL.code, "Redirect count exceeded");
            return;
        }

        info!(
            "redirected to {}:{} ({} of {})",
            host, port, count, REDIRECT_COUNT_MAX
        );
        self.set_state(ConnState::Redirect);
        self.disconnect(false);
    }

    /// Record the gateway's negotiated version and time, then validate the
    /// version against the supported range for the active framing mode.
    /// An out-of-range version is fatal: disconnect and report.
    pub fn on_version_received(&self, version: i32, server_time: &str) {
        self.shared.server_version.store(version, Ordering::SeqCst);
        self.session().server_time = server_time.to_string();
        self.shared.redirect_count.store(0, Ordering::Relaxed);

        let supported = match self.shared.framing {
            FramingMode::LengthPrefixed => {
                (MIN_VERSION_FRAMED..=MAX_VERSION_FRAMED).contains(&version)
            }
            FramingMode::Legacy => version >= MIN_VERSION_LEGACY,
        };

        if !supported {
            warn!("gateway version {} outside supported range", version);
            self.disconnect(true);
            self.shared.events.on_error(
                NO_VALID_ID,
                UNSUPPORTED_VERSION.code,
                UNSUPPORTED_VERSION.msg,
            );
            return;
        }

        info!("session established, gateway version {}", version);
    }

    /// Reserve the frame header region at the front of an outbound buffer.
    /// No-op under legacy framing, which has no header.
    pub fn prepare_outgoing(&self, buf: &mut Vec<u8>) {
        if self.shared.framing == FramingMode::LengthPrefixed {
            prepare_frame(buf);
        }
    }

    /// Finalize and queue one outbound message.
    ///
    /// Under length-prefixed framing the payload length is patched into
    /// the reserved header region at `offset`; a payload over the protocol
    /// maximum is rejected with a bad-length report before any bytes reach
    /// the wire, leaving the connection state unchanged.
    pub fn close_and_send(&self, mut msg: Vec<u8>, offset: usize) -> bool {
        let Some(transport) = self.transport() else {
            self.shared
                .events
                .on_error(NO_VALID_ID, NOT_CONNECTED.code, NOT_CONNECTED.msg);
            return false;
        };

        if self.shared.framing == FramingMode::LengthPrefixed {
            if let Err(e) = encode_frame_len(&mut msg, offset) {
                error!("outbound frame rejected: {}", e);
                self.shared
                    .events
                    .on_error(NO_VALID_ID, BAD_LENGTH.code, BAD_LENGTH.msg);
                return false;
            }
        }

        match transport.buffered_send(&msg) {
            Ok(_) => true,
            Err(e) => {
                self.record_error(e);
                self.handle_socket_error()
            }
        }
    }

    /// Classify the most recent socket error. The single chokepoint for
    /// every socket-layer failure:
    ///
    /// - no recorded error: nothing happened, report success
    /// - would-block: transient, retry later, no callback
    /// - connection refused: connect-failure report, disconnect
    /// - anything else: socket-exception report with the OS text, disconnect
    pub fn handle_socket_error(&self) -> bool {
        let Some(err) = self.take_error() else {
            return true;
        };

        match err.kind() {
            io::ErrorKind::WouldBlock => false,
            io::ErrorKind::ConnectionRefused => {
                self.shared
                    .events
                    .on_error(NO_VALID_ID, CONNECT_FAIL.code, CONNECT_FAIL.msg);
                self.disconnect(true);
                false
            }
            _ => {
                let text = format!("{}{}", SOCKET_EXCEPTION.msg, err);
                self.shared
                    .events
                    .on_error(NO_VALID_ID, SOCKET_EXCEPTION.code, &text);
                self.disconnect(true);
                false
            }
        }
    }

    /// Drain the outbound buffer as far as the socket will accept, funneling
    /// failures into error classification. Safe to call from either task.
    pub(crate) fn on_writable(&self) {
        let Some(transport) = self.transport() else {
            return;
        };
        if let Err(e) = transport.send_buffered_data() {
            self.record_error(e);
            self.handle_socket_error();
        }
    }

    /// End of stream observed on read: tear down and notify.
    pub(crate) fn on_close(&self) {
        self.disconnect(true);
        self.shared.events.on_connection_closed();
    }

    pub(crate) fn record_error(&self, err: io::Error) {
        *self
            .shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(err);
    }

    fn take_error(&self) -> Option<io::Error> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Whether the socket is currently usable.
    pub fn is_socket_ok(&self) -> bool {
        self.socket_slot().is_some()
    }

    pub fn state(&self) -> ConnState {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnState) {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Negotiated gateway version; 0 until the handshake completes.
    pub fn server_version(&self) -> i32 {
        self.shared.server_version.load(Ordering::SeqCst)
    }

    pub fn server_time(&self) -> String {
        self.session().server_time.clone()
    }

    pub fn host(&self) -> String {
        self.session().host.clone()
    }

    pub fn port(&self) -> u16 {
        self.session().port
    }

    pub fn client_id(&self) -> i32 {
        self.session().client_id
    }

    pub fn extra_auth(&self) -> bool {
        self.session().extra_auth
    }

    pub fn framing_mode(&self) -> FramingMode {
        self.shared.framing
    }

    pub fn signal(&self) -> &Arc<Signal> {
        &self.shared.signal
    }

    pub(crate) fn events(&self) -> &Arc<dyn EventSink> {
        &self.shared.events
    }

    pub(crate) fn probe(&self) -> Option<Arc<dyn FrameProbe>> {
        self.shared.probe.clone()
    }

    pub(crate) fn transport(&self) -> Option<Arc<Transport>> {
        self.socket_slot().clone()
    }

    fn socket_slot(&self) -> MutexGuard<'_, Option<Arc<Transport>>> {
        self.shared.socket.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
