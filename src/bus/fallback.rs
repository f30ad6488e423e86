//! Unbounded FIFO outlet for messages nothing else claimed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Both halves of the channel live here, so it never disconnects while the
/// bus exists.
#[derive(Debug)]
pub(crate) struct Fallback<M> {
    tx: UnboundedSender<M>,
    rx: Mutex<UnboundedReceiver<M>>,
    pending: AtomicUsize,
}

impl<M> Fallback<M> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
        }
    }

    /// Queue a message. Never waits.
    pub fn push(&self, message: M) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Wait for the next message. Cancel safe: dropping the future before it
    /// completes leaves the queue untouched.
    pub async fn pop(&self) -> M {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(message) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                message
            }
            // `tx` is owned alongside `rx`, so the channel cannot close.
            None => std::future::pending().await,
        }
    }

    /// Take the next message if one is ready and no other task is currently
    /// waiting on the queue. Returns `None` while a `pop` is parked, even
    /// when `pending() > 0`.
    pub fn try_pop(&self) -> Option<M> {
        let mut rx = self.rx.try_lock().ok()?;
        let message = rx.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
