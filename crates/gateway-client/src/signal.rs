//! Cross-task wake primitive.
//!
//! One edge-triggered "message available" flag: the reader task sets it,
//! the consumer blocks until it is set or a timeout elapses, and the flag
//! is cleared on the way out of every wait. A signal issued between two
//! waits is sticky across exactly one wait; repeated signals do not
//! accumulate. Spurious wakeups are legal, so the consumer must check the
//! queue after every wait, including timeouts.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

/// Edge-triggered wake flag shared between the reader task and the
/// consumer.
#[derive(Debug, Default)]
pub struct Signal {
    pending: Mutex<bool>,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record "event pending" and wake the waiter, if any.
    pub fn issue_signal(&self) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.notify.notify_one();
    }

    /// Block until the flag is set or `timeout` elapses, then clear the
    /// flag. `None` waits indefinitely. Returns whether the flag was set.
    pub async fn wait_for_signal(&self, timeout: Option<Duration>) -> bool {
        if self.take_pending() {
            return true;
        }

        match timeout {
            None => self.notify.notified().await,
            Some(t) => {
                let _ = tokio::time::timeout(t, self.notify.notified()).await;
            }
        }

        self.take_pending()
    }

    fn take_pending(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }
}
