//! Framing reader: turns the raw byte stream into discrete messages.
//!
//! The reader runs on its own spawned task so the consumer never blocks on
//! socket I/O. Its loop alternates between one bounded readiness check
//! over the socket (100 ms cap, write interest only while outbound bytes
//! are pending) and one attempt to extract a complete message into the
//! queue. The inbound accumulator belongs exclusively to this task.
//!
//! Extraction follows the session's framing discipline: a fixed two-phase
//! header-then-payload read under length-prefixed framing, or incremental
//! content probing under the legacy discipline, where the accumulator
//! doubles once it is three-quarters full so a message larger than the
//! default capacity can still be assembled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use gateway_protocol::{frame_len, FramingMode, DEFAULT_BUF_CAPACITY, HEADER_LEN, MAX_MSG_LEN};

use crate::connection::GatewayConnection;
use crate::decoder::{MessageDecoder, Probe};
use crate::events::{BAD_LENGTH, NO_VALID_ID};
use crate::queue::{Message, MessageQueue};
use crate::transport::Transport;

/// Upper bound on one readiness check.
pub(crate) const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Background reader for one live connection.
///
/// Start it after a successful connect; drop or [`FrameReader::stop`] it
/// to shut the connection down. Dropping while the task is active forces
/// the socket closed so the task cannot stay blocked in a readiness wait.
pub struct FrameReader {
    conn: GatewayConnection,
    queue: Arc<MessageQueue>,
    alive: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameReader {
    pub fn new(conn: GatewayConnection) -> Self {
        Self {
            conn,
            queue: Arc::new(MessageQueue::new()),
            alive: Arc::new(AtomicBool::new(true)),
            handle: None,
        }
    }

    /// Spawn the background read loop. Call once, after the handshake.
    pub fn start(&mut self) {
        let read_loop = ReadLoop::with_liveness(
            self.conn.clone(),
            self.queue.clone(),
            self.alive.clone(),
        );
        self.handle = Some(tokio::spawn(read_loop.run()));
    }

    /// Drain everything currently queued through the decoder, flushing the
    /// outbound buffer first.
    ///
    /// Messages are handed to the decoder one at a time, in arrival order,
    /// stopping when the queue empties or the decoder reports zero bytes
    /// consumed. One call batches the whole backlog.
    pub fn process_msgs(&self, decoder: &mut dyn MessageDecoder) {
        self.conn.on_writable();

        let Some(first) = self.queue.pop() else {
            return;
        };

        let mut msg = first;
        while decoder.apply(msg.as_bytes()) > 0 {
            match self.queue.pop() {
                Some(next) => msg = next,
                None => break,
            }
        }
    }

    /// Cooperative shutdown: clear the liveness flag, force the socket
    /// closed to unblock the task, and wait for it to finish.
    pub async fn stop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.conn.disconnect(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            self.conn.disconnect(true);
            handle.abort();
        }
    }
}

/// The read loop proper. Owned by the background task, except during the
/// connect handshake where the connection drives one synchronously.
pub(crate) struct ReadLoop {
    conn: GatewayConnection,
    queue: Arc<MessageQueue>,
    alive: Arc<AtomicBool>,
    buf: BytesMut,
    max_buf_size: usize,
}

impl ReadLoop {
    /// A loop with its own always-alive flag, for the handshake pump.
    pub(crate) fn new(conn: GatewayConnection, queue: Arc<MessageQueue>) -> Self {
        Self::with_liveness(conn, queue, Arc::new(AtomicBool::new(true)))
    }

    fn with_liveness(
        conn: GatewayConnection,
        queue: Arc<MessageQueue>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            conn,
            queue,
            alive,
            buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            max_buf_size: DEFAULT_BUF_CAPACITY,
        }
    }

    pub(crate) async fn run(mut self) {
        while self.alive.load(Ordering::SeqCst) {
            if self.buf.is_empty() && !self.poll_readiness().await && self.conn.is_socket_ok() {
                continue;
            }

            if !self.put_message_to_queue().await {
                break;
            }
        }

        debug!("read loop exiting");
        self.conn.handle_socket_error();

        // Wake the consumer so it can observe the dead connection instead
        // of blocking on a queue that will never fill again.
        self.conn.signal().issue_signal();
    }

    /// Extract one message and enqueue it. Returns false when no message
    /// could be produced, which means the socket is gone.
    pub(crate) async fn put_message_to_queue(&mut self) -> bool {
        let msg = if self.conn.is_socket_ok() {
            self.read_single_msg().await
        } else {
            None
        };

        match msg {
            Some(msg) => {
                self.queue.push(msg);
                self.conn.signal().issue_signal();
                true
            }
            None => false,
        }
    }

    async fn read_single_msg(&mut self) -> Option<Message> {
        match self.conn.framing_mode() {
            FramingMode::LengthPrefixed => self.read_framed_msg().await,
            FramingMode::Legacy => self.read_legacy_msg().await,
        }
    }

    /// Fixed two-phase read: 4-byte big-endian length, then exactly that
    /// many payload bytes. No content inspection required.
    async fn read_framed_msg(&mut self) -> Option<Message> {
        let mut header = [0u8; HEADER_LEN];
        if !self.buffered_read(&mut header).await {
            return None;
        }

        let len = frame_len(header) as usize;
        if len == 0 || len > MAX_MSG_LEN {
            error!("inbound frame announces {} bytes, treating as corruption", len);
            self.conn
                .events()
                .on_error(NO_VALID_ID, BAD_LENGTH.code, BAD_LENGTH.msg);
            self.conn.disconnect(true);
            return None;
        }

        let mut payload = vec![0u8; len];
        if !self.buffered_read(&mut payload).await {
            return None;
        }

        Some(Message::new(payload))
    }

    /// Legacy self-delimiting read: accumulate bytes and ask the content
    /// probe for a boundary until it reports one, growing the accumulator
    /// cap whenever it runs three-quarters full.
    async fn read_legacy_msg(&mut self) -> Option<Message> {
        let Some(probe) = self.conn.probe() else {
            warn!("legacy framing configured without a frame probe");
            return None;
        };

        let mut size = 0usize;
        while size == 0 {
            if self.buf.len() >= self.max_buf_size * 3 / 4 {
                self.max_buf_size *= 2;
                debug!("inbound accumulator cap grown to {}", self.max_buf_size);
            }

            if !self.poll_readiness().await && !self.conn.is_socket_ok() {
                return None;
            }

            if let Probe::Complete(n) = probe.probe(&self.buf) {
                size = n;
            }
        }

        let mut payload = vec![0u8; size];
        if !self.buffered_read(&mut payload).await {
            return None;
        }

        // Steady-state memory bound: once drained well below the default,
        // compact the accumulator back down.
        if self.buf.len() < DEFAULT_BUF_CAPACITY && self.buf.capacity() > DEFAULT_BUF_CAPACITY {
            let mut compacted = BytesMut::with_capacity(DEFAULT_BUF_CAPACITY);
            compacted.extend_from_slice(&self.buf);
            self.buf = compacted;
            self.max_buf_size = DEFAULT_BUF_CAPACITY;
        }

        Some(Message::new(payload))
    }

    /// Pull exactly `dest.len()` bytes out of the accumulator, polling for
    /// more as needed and consuming from the front. Returns false if the
    /// socket dies first; callers treat that as "no message this round",
    /// not corruption.
    async fn buffered_read(&mut self, dest: &mut [u8]) -> bool {
        let mut filled = 0usize;

        while filled < dest.len() {
            let remaining = dest.len() - filled;

            while self.buf.len() < remaining && self.buf.len() < self.max_buf_size {
                if !self.poll_readiness().await && !self.conn.is_socket_ok() {
                    return false;
                }
            }

            let n = remaining.min(self.max_buf_size);
            dest[filled..filled + n].copy_from_slice(&self.buf[..n]);
            self.buf.advance(n);
            filled += n;
        }

        true
    }

    /// One bounded readiness check, dispatching writable and readable
    /// conditions. Returns false on timeout or when the socket is gone.
    async fn poll_readiness(&mut self) -> bool {
        let Some(transport) = self.conn.transport() else {
            return false;
        };

        let ready = match timeout(POLL_TIMEOUT, transport.ready()).await {
            Err(_) => return false,
            Ok(Err(e)) => {
                self.conn.record_error(e);
                self.conn.handle_socket_error();
                return false;
            }
            Ok(Ok(ready)) => ready,
        };

        if !self.conn.is_socket_ok() {
            return false;
        }

        if ready.is_writable() {
            self.conn.on_writable();
        }

        if !self.conn.is_socket_ok() {
            return false;
        }

        if ready.is_readable() || ready.is_read_closed() {
            self.on_readable(&transport);
        }

        true
    }

    /// Move whatever the socket has for us into the accumulator, up to the
    /// current cap. A zero-length read is end of stream.
    fn on_readable(&mut self, transport: &Transport) {
        let offset = self.buf.len();
        if offset >= self.max_buf_size {
            return;
        }

        self.buf.resize(self.max_buf_size, 0);
        match transport.try_read(&mut self.buf[offset..]) {
            Ok(0) => {
                self.buf.truncate(offset);
                self.conn.on_close();
            }
            Ok(n) => {
                self.buf.truncate(offset + n);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.buf.truncate(offset);
            }
            Err(e) => {
                self.buf.truncate(offset);
                self.conn.record_error(e);
                self.conn.handle_socket_error();
            }
        }
    }
}
