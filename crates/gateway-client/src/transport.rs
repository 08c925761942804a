//! Socket transport with an outbound accumulator.
//!
//! The outbound buffer collects not-yet-sent bytes and is drained
//! opportunistically whenever the socket reports writable, from either
//! task. `TcpStream::try_write` takes `&self`, and the pending bytes sit
//! under their own mutex, so concurrent drains interleave safely; the
//! mutex is held only for buffer bookkeeping and the non-blocking write
//! itself.

use std::io;
use std::sync::{Mutex, MutexGuard};

use bytes::{Buf, BytesMut};
use tokio::io::{Interest, Ready};
use tokio::net::TcpStream;

#[derive(Debug)]
pub(crate) struct Transport {
    stream: TcpStream,
    outbound: Mutex<BytesMut>,
}

impl Transport {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            outbound: Mutex::new(BytesMut::new()),
        }
    }

    /// Queue `data` behind any pending bytes, then drain as much as the
    /// socket will currently accept. Returns the number of bytes written
    /// by this call.
    pub(crate) fn buffered_send(&self, data: &[u8]) -> io::Result<usize> {
        let mut out = self.lock_outbound();
        out.extend_from_slice(data);
        self.drain(&mut out)
    }

    /// Drain pending bytes until the buffer empties or the socket would
    /// block.
    pub(crate) fn send_buffered_data(&self) -> io::Result<usize> {
        let mut out = self.lock_outbound();
        self.drain(&mut out)
    }

    pub(crate) fn is_outbound_empty(&self) -> bool {
        self.lock_outbound().is_empty()
    }

    /// One readiness check over the stream. Write interest is only worth
    /// asking for while bytes are pending.
    pub(crate) async fn ready(&self) -> io::Result<Ready> {
        let interest = if self.is_outbound_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };
        self.stream.ready(interest).await
    }

    pub(crate) fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    fn drain(&self, out: &mut BytesMut) -> io::Result<usize> {
        let mut sent = 0;
        while !out.is_empty() {
            match self.stream.try_write(out) {
                Ok(n) => {
                    out.advance(n);
                    sent += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }

    fn lock_outbound(&self) -> MutexGuard<'_, BytesMut> {
        self.outbound.lock().unwrap_or_else(|e| e.into_inner())
    }
}
