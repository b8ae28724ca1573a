/// Best-value tracking
///
/// Keeps the highest focus level seen during one acquisition session.
/// [`BestFocusTracker`] is the single-owner session state used by the
/// synchronous loop; [`SharedBestFocus`] is the lock-free variant for the
/// pipelined loop and for observers on other threads.
use crate::invariant_ppt::BEST_FOCUS_MONOTONIC;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running maximum of focus levels, starting at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestFocusTracker {
    best: f64,
}

impl BestFocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `level` into the running maximum and return the new best.
    ///
    /// NaN levels are ignored.
    pub fn update(&mut self, level: f64) -> f64 {
        let previous = self.best;
        self.best = self.best.max(level);
        crate::assert_invariant!(
            self.best >= previous,
            BEST_FOCUS_MONOTONIC,
            "BestFocusTracker::update"
        );
        self.best
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Atomic running maximum shared between threads.
///
/// The value is stored as `f64` bits; updates retry a compare-and-swap until
/// either the stored value is already at least `level` or the swap lands.
/// Focus levels are non-negative, so the bit patterns order the same way as
/// the values they encode.
#[derive(Debug, Clone, Default)]
pub struct SharedBestFocus {
    bits: Arc<AtomicU64>,
}

impl SharedBestFocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, level: f64) -> f64 {
        if level.is_nan() {
            return self.get();
        }
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let best = f64::from_bits(current);
            if best >= level {
                return best;
            }
            match self.bits.compare_exchange_weak(
                current,
                level.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    crate::assert_invariant!(
                        level >= best,
                        BEST_FOCUS_MONOTONIC,
                        "SharedBestFocus::update"
                    );
                    return level;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Back to 0 for a new session. Handles already given out follow along.
    pub(crate) fn restart(&self) {
        self.bits.store(0f64.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_starts_at_zero() {
        assert_eq!(BestFocusTracker::new().best(), 0.0);
        assert_eq!(SharedBestFocus::new().get(), 0.0);
    }

    #[test]
    fn test_tracker_reports_running_max() {
        let mut tracker = BestFocusTracker::new();
        let bests: Vec<f64> = [12.5, 40.0, 31.0, 40.0, 41.5]
            .iter()
            .map(|&level| tracker.update(level))
            .collect();
        assert_eq!(bests, vec![12.5, 40.0, 40.0, 40.0, 41.5]);
    }

    #[test]
    fn test_tracker_ignores_nan() {
        let mut tracker = BestFocusTracker::new();
        tracker.update(3.0);
        assert_eq!(tracker.update(f64::NAN), 3.0);
    }

    #[test]
    fn test_shared_tracker_concurrent_updates() {
        let shared = SharedBestFocus::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..1000u32 {
                        shared.update((i * 8 + t) as f64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.get(), 7999.0);
    }

    #[test]
    fn test_shared_tracker_never_decreases() {
        let shared = SharedBestFocus::new();
        assert_eq!(shared.update(10.0), 10.0);
        assert_eq!(shared.update(2.0), 10.0);
        assert_eq!(shared.update(f64::NAN), 10.0);
        assert_eq!(shared.get(), 10.0);
    }
}
