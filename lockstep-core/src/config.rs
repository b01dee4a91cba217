//! Clock configuration
//!
//! The lookahead horizon and poll cadence are fixed when a [`Clock`] is
//! built. The horizon has to cover at least one poll interval plus
//! [`SAFETY_MARGIN_SECS`] so a late poll never lets a step slip past
//! unscheduled.
//!
//! [`Clock`]: crate::Clock

use crate::error::ClockError;

/// Minimum slack between the poll interval and the lookahead horizon
pub const SAFETY_MARGIN_SECS: f64 = 0.02;

/// Tunable timing constants of a clock
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClockConfig {
    /// How far past `now` each poll schedules steps (seconds)
    pub schedule_ahead_secs: f64,
    /// Cadence of the poll loop (milliseconds)
    pub poll_interval_ms: u64,
    /// Minimum distance from `now` of any emitted event (seconds)
    pub epsilon_secs: f64,
    /// Master tempo at construction
    pub initial_bpm: f64,
    /// Step count used when a device spec leaves it unset
    pub default_step_count: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            schedule_ahead_secs: 0.15,
            poll_interval_ms: 25,
            epsilon_secs: 0.005,
            initial_bpm: 120.0,
            default_step_count: 16,
        }
    }
}

impl ClockConfig {
    pub fn with_schedule_ahead(mut self, secs: f64) -> Self {
        self.schedule_ahead_secs = secs;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_epsilon(mut self, secs: f64) -> Self {
        self.epsilon_secs = secs;
        self
    }

    pub fn with_initial_bpm(mut self, bpm: f64) -> Self {
        self.initial_bpm = bpm;
        self
    }

    pub fn with_default_step_count(mut self, steps: usize) -> Self {
        self.default_step_count = steps;
        self
    }

    /// Poll interval in seconds
    pub fn poll_interval_secs(&self) -> f64 {
        self.poll_interval_ms as f64 / 1000.0
    }

    /// Check that the horizon outruns the poll cadence and every value is usable
    pub fn validate(&self) -> Result<(), ClockError> {
        if self.poll_interval_ms == 0 {
            return Err(ClockError::InvalidConfig(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        if !self.schedule_ahead_secs.is_finite() || self.schedule_ahead_secs <= 0.0 {
            return Err(ClockError::InvalidConfig(format!(
                "schedule-ahead horizon must be positive, got {}",
                self.schedule_ahead_secs
            )));
        }
        let required = self.poll_interval_secs() + SAFETY_MARGIN_SECS;
        if self.schedule_ahead_secs < required {
            return Err(ClockError::InvalidConfig(format!(
                "schedule-ahead horizon {:.3}s must be at least {:.3}s for a {} ms poll interval",
                self.schedule_ahead_secs, required, self.poll_interval_ms
            )));
        }
        if !self.epsilon_secs.is_finite() || self.epsilon_secs < 0.0 {
            return Err(ClockError::InvalidConfig(format!(
                "epsilon must be zero or positive, got {}",
                self.epsilon_secs
            )));
        }
        if self.epsilon_secs >= self.schedule_ahead_secs {
            return Err(ClockError::InvalidConfig(
                "epsilon must be smaller than the schedule-ahead horizon".to_string(),
            ));
        }
        if !crate::timebase::is_valid_bpm(self.initial_bpm) {
            return Err(ClockError::InvalidConfig(format!(
                "initial tempo must be a positive number, got {}",
                self.initial_bpm
            )));
        }
        if self.default_step_count == 0 {
            return Err(ClockError::InvalidConfig(
                "default step count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
