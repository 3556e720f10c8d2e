//! Single-slot frame hub
//!
//! The hub holds the most recent encoded frame and fans every new frame out to
//! all client sessions that are waiting at publish time. It is built on
//! `tokio::sync::broadcast` with a capacity of one, so at most one frame is
//! ever buffered per subscriber:
//!
//! ```text
//!                     FrameHub
//!               ┌──────────────────────┐
//!  capture ───► │ latest: EncodedFrame │
//!  publish()    │ tx: broadcast(1)     │
//!               └──────────┬───────────┘
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!   wait_for_next()  wait_for_next()  wait_for_next()
//! ```
//!
//! A subscriber that is busy when several frames land skips to the newest one
//! and never sees a stale frame after a newer one was published. A subscriber
//! created after a publish does not receive that frame.
//!
//! `bytes::Bytes` is reference counted, so every subscriber shares the same
//! allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::media::EncodedFrame;

/// Latest-frame-wins broadcast slot
pub struct FrameHub {
    tx: broadcast::Sender<EncodedFrame>,
    latest: RwLock<Option<EncodedFrame>>,
    published: AtomicU64,
}

impl FrameHub {
    /// Create an empty hub
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            latest: RwLock::new(None),
            published: AtomicU64::new(0),
        }
    }

    /// Replace the current frame and wake every waiting subscriber
    ///
    /// Every call is a new notification, even if the bytes equal the previous
    /// frame. Returns the number of subscribers notified.
    pub fn publish(&self, frame: EncodedFrame) -> usize {
        *self.latest.write() = Some(frame.clone());
        self.published.fetch_add(1, Ordering::Relaxed);

        // Err only means there are no subscribers right now
        self.tx.send(frame).unwrap_or(0)
    }

    /// Register a new waiter. It only observes frames published from now on.
    pub fn subscribe(&self) -> FrameSubscriber {
        FrameSubscriber {
            rx: self.tx.subscribe(),
            skipped: 0,
        }
    }

    /// Current slot value
    pub fn latest(&self) -> Option<EncodedFrame> {
        self.latest.read().clone()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total frames published since creation
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One waiter on a [`FrameHub`]
pub struct FrameSubscriber {
    rx: broadcast::Receiver<EncodedFrame>,
    skipped: u64,
}

impl FrameSubscriber {
    /// Wait for the next published frame
    ///
    /// If several frames were published since the last call, only the newest is
    /// returned. Returns `None` once the hub is dropped.
    pub async fn wait_for_next(&mut self) -> Option<EncodedFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.skipped += n;
                    tracing::trace!(skipped = n, "Subscriber lagged, skipping to latest frame");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Frames this subscriber skipped because a newer one replaced them
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
