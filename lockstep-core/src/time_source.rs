//! Time sources
//!
//! The clock never owns or advances time; it only reads a monotonically
//! increasing value in seconds from whatever renders the audio.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing clock in seconds
pub trait TimeSource: Send {
    fn now(&self) -> f64;
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<T: TimeSource + Sync + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// A time source that only moves when told to
///
/// Clones share the same underlying time, so a test can keep one copy and
/// hand another to the clock.
#[derive(Clone, Debug, Default)]
pub struct ManualTimeSource {
    /// Seconds stored as bits for atomic operations
    seconds: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(seconds: f64) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(seconds.to_bits())),
        }
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, seconds: f64) {
        let current = self.get();
        if seconds > current {
            self.seconds.store(seconds.to_bits(), Ordering::Relaxed);
        }
    }

    /// Move forward by `delta` seconds
    pub fn advance(&self, delta: f64) {
        if delta > 0.0 {
            self.set(self.get() + delta);
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Relaxed))
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> f64 {
        self.get()
    }
}
