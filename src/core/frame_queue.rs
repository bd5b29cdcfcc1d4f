//! Bounded hand-off between the thermal hardware callback and the thermal loop.
//!
//! Overflow policy is drop-newest: when the queue is full the incoming frame
//! is discarded and counted, and the producer returns immediately. Frames
//! already queued are never evicted, so the consumer always sees the oldest
//! pending frames in arrival order.

use crate::core::frame::Gray16Image;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Dropped,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Timeout,
    Disconnected,
}

/// Producer half, cloned into whatever thread the driver delivers frames on.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<Gray16Image>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    /// Never blocks.
    pub fn push(&self, frame: Gray16Image) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct FrameQueue {
    rx: mpsc::Receiver<Gray16Image>,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    pub async fn next_frame(&mut self, timeout: Duration) -> Result<Gray16Image, QueueError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(QueueError::Disconnected),
            Err(_) => Err(QueueError::Timeout),
        }
    }

    /// Discards everything pending, returning how many frames were thrown away.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub fn bounded(depth: usize) -> (FrameSink, FrameQueue) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        FrameSink { tx, dropped: Arc::clone(&dropped) },
        FrameQueue { rx, dropped },
    )
}
