//! Bounded frame queue shared between a grabbing thread and its consumer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Returned when pushing into a queue that has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

pub struct FrameQueue<T> {
    inner: Mutex<QueueInner<T>>,
    cv: Condvar,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    // Queue state is consistent at every unlock, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push, evicting the oldest item when full. Live preview semantics.
    pub fn push_drop_oldest(&self, item: T) -> Result<(), QueueClosed> {
        let mut g = self.lock();
        if g.closed {
            return Err(QueueClosed);
        }
        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(item);
        self.cv.notify_all();
        Ok(())
    }

    /// Push, waiting for space when full. Every item reaches the consumer.
    pub fn push_blocking(&self, item: T) -> Result<(), QueueClosed> {
        let mut g = self.lock();
        loop {
            if g.closed {
                return Err(QueueClosed);
            }
            if g.items.len() < g.capacity {
                g.items.push_back(item);
                self.cv.notify_all();
                return Ok(());
            }
            g = self.cv.wait(g).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Pop the oldest item, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout. Items queued before `close()` are
    /// still handed out; `Err` only once the queue is closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueClosed> {
        let mut g = self.lock();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_front() {
                self.cv.notify_all();
                return Ok(Some(item));
            }
            if g.closed {
                return Err(QueueClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (ng, _) = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
    }

    /// Pop the oldest item, waiting as long as it takes.
    pub fn pop(&self) -> Result<T, QueueClosed> {
        let mut g = self.lock();
        loop {
            if let Some(item) = g.items.pop_front() {
                self.cv.notify_all();
                return Ok(item);
            }
            if g.closed {
                return Err(QueueClosed);
            }
            g = self.cv.wait(g).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        self.cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
