//! Message hand-off between the reader task and the consumer.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

/// One complete protocol frame, header stripped.
///
/// Created by the reader when a frame completes; ownership moves into the
/// queue and then to the consumer, which drops it after decoding.
#[derive(Debug, Clone)]
pub struct Message {
    data: Bytes,
}

impl Message {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered FIFO of messages, one producer (the reader task) and one
/// consumer. Insertion order is wire arrival order and is never reordered.
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: Mutex<VecDeque<Message>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. The lock is held only for the push; no I/O
    /// happens under it.
    pub fn push(&self, msg: Message) {
        self.lock().push_back(msg);
    }

    /// Pop the oldest message, if any.
    pub fn pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
