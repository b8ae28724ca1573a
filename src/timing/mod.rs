//! Session timebase
//!
//! Reports and synthetic frames are stamped against one monotonic clock
//! started when the acquisition session begins.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock shared by the acquisition loop and its frame source.
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Arc<Instant>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Seconds since the session started.
    #[inline]
    pub fn seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Microseconds since the session started, saturating at `u64::MAX`.
    #[inline]
    pub fn micros(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
