//! One-shot latch for awaiting a media event with a bounded timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Outcome of [`EventLatch::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchWait {
    /// The latch was released within the timeout.
    Released,
    /// The timeout elapsed first. The latch may still be released later.
    TimedOut,
}

impl LatchWait {
    pub fn is_released(self) -> bool {
        matches!(self, LatchWait::Released)
    }
}

/// One-shot latch released exactly once by an event callback and awaited by
/// the test body.
///
/// Clones share state, so one handle can be moved into an event subscription
/// task while the test keeps another to wait on. Releasing an already
/// released latch is a no-op, which makes duplicate event deliveries
/// harmless.
#[derive(Debug, Clone, Default)]
pub struct EventLatch {
    inner: Arc<LatchInner>,
}

#[derive(Debug, Default)]
struct LatchInner {
    released: AtomicBool,
    notify: Notify,
}

impl EventLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the latch, waking every current and future waiter.
    pub fn release(&self) {
        self.inner.released.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Waits until the latch is released or `timeout` elapses, whichever
    /// comes first.
    pub async fn wait(&self, timeout: Duration) -> LatchWait {
        if self.is_released() {
            return LatchWait::Released;
        }
        let released = async {
            loop {
                // Register before re-checking so a release between the check
                // and the await cannot be missed.
                let notified = self.inner.notify.notified();
                if self.is_released() {
                    break;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(timeout, released).await {
            Ok(()) => LatchWait::Released,
            Err(_) => LatchWait::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_when_already_released() {
        let latch = EventLatch::new();
        latch.release();
        assert_eq!(latch.wait(Duration::from_millis(1)).await, LatchWait::Released);
    }

    #[tokio::test]
    async fn release_wakes_a_pending_waiter() {
        let latch = EventLatch::new();
        let waiter = latch.clone();
        let handle = tokio::spawn(async move { waiter.wait(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        latch.release();

        assert_eq!(handle.await.unwrap(), LatchWait::Released);
    }

    #[tokio::test]
    async fn wait_times_out_when_never_released() {
        let latch = EventLatch::new();
        assert_eq!(latch.wait(Duration::from_millis(30)).await, LatchWait::TimedOut);
        assert!(!latch.is_released());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let latch = EventLatch::new();
        latch.release();
        latch.release();
        assert!(latch.is_released());
        assert_eq!(latch.wait(Duration::from_millis(1)).await, LatchWait::Released);
    }
}
