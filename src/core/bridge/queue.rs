//! Bounded drop-oldest frame queue.
//!
//! The coupling between the caller's inbound stream and the backend writer.
//! Producers never block: when the queue is full the oldest frame is evicted
//! and counted, so a slow backend costs stale audio rather than unbounded
//! memory or a stalled caller. FIFO order is preserved for every frame that
//! survives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

pub struct FrameQueue {
    frames: Mutex<VecDeque<Bytes>>,
    notify: Notify,
    capacity: usize,
    dropped: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames. `dropped` is the
    /// session's shared overrun counter, incremented once per evicted frame.
    pub fn new(capacity: usize, dropped: Arc<AtomicU64>) -> Self {
        assert!(capacity > 0, "frame queue capacity must be non-zero");
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            dropped,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a frame, evicting the oldest one if full. Returns `true` if a
    /// frame was evicted. Never blocks.
    pub fn push(&self, frame: Bytes) -> bool {
        let evicted = {
            let mut frames = self.frames.lock();
            let evicted = if frames.len() == self.capacity {
                frames.pop_front();
                true
            } else {
                false
            };
            frames.push_back(frame);
            evicted
        };
        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        evicted
    }

    /// Dequeue the oldest frame, waiting until one is available. Returns
    /// `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Bytes> {
        loop {
            // The notified future must exist before the emptiness check, or a
            // close/push landing between check and await would be missed.
            let notified = self.notify.notified();
            {
                let mut frames = self.frames.lock();
                if let Some(frame) = frames.pop_front() {
                    return Some(frame);
                }
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Mark the queue closed. Pending frames remain poppable; waiters wake.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Total frames evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
