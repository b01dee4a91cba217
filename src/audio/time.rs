//! Time sources for the runtime
//!
//! The audio renderer's sample counter is the reference clock when an output
//! stream is open. Without one, a monotonic wall clock stands in.

use lockstep_core::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A time source that can be read from several threads at once
pub type SharedTime = Arc<dyn TimeSource + Sync>;

/// Seconds since construction, from the OS monotonic clock
#[derive(Clone, Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Time derived from the number of frames an audio stream has rendered
///
/// The output callback calls [`AudioTimeSource::advance`] once per buffer;
/// every other thread only reads.
#[derive(Clone, Debug)]
pub struct AudioTimeSource {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTimeSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Frames rendered so far (called from any thread)
    pub fn current_frame(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Advance by one buffer (called from the audio callback)
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Frame index at which `seconds` falls; negative times map to frame 0
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }
}

impl TimeSource for AudioTimeSource {
    fn now(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate
    }
}
