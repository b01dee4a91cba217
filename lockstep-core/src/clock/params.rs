//! Tempo and mode parameters
//!
//! All setters fail silently: an invalid value or unknown id leaves the
//! previous state in place so playback never stops over a bad input.

use super::Clock;
use crate::time_source::TimeSource;
use crate::timebase;
use crate::types::tempo::is_valid_multiplier;
use crate::types::{Multiplier, TempoMode};
use log::debug;

/// Move `next` so that the time left until it scales by `ratio`.
///
/// The time left is measured from the later of `now` and the last time
/// already handed to the device. Events between `now` and that time were
/// emitted at the old tempo and cannot be retracted, so the rebased step
/// has to land after them.
pub(crate) fn rebase_next_event(next: f64, last_scheduled: Option<f64>, now: f64, ratio: f64) -> f64 {
    let anchor = last_scheduled.map_or(now, |last| last.max(now));
    let remaining = (next - anchor).max(0.0);
    anchor + remaining * ratio
}

impl<T: TimeSource> Clock<T> {
    /// Change the master tempo.
    ///
    /// While running, every unpaused sync device keeps its phase within the
    /// current step: the remaining time until its next step is scaled by
    /// `new_step / old_step`. Free devices are untouched.
    pub fn set_master_bpm(&mut self, bpm: f64) {
        if !timebase::is_valid_bpm(bpm) {
            debug!("Ignoring invalid master tempo {}", bpm);
            return;
        }
        let old_step = self.master_step_duration();
        self.master_bpm = bpm;
        let new_step = self.master_step_duration();

        if !self.running {
            return;
        }
        let now = self.now();
        // The multiplier divides both durations and cancels out
        let ratio = new_step / old_step;
        for entry in self.registry.iter_mut() {
            let state = &mut entry.state;
            if state.mode != TempoMode::Sync || state.paused {
                continue;
            }
            state.next_event_time =
                rebase_next_event(state.next_event_time, state.last_scheduled, now, ratio);
        }
    }

    /// Switch a device between sync and free tempo. Takes effect from the
    /// device's next event without rebasing.
    pub fn set_mode(&mut self, id: &str, mode: TempoMode) {
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state.mode = mode;
        }
    }

    /// Set a sync device's speed multiplier. Zero and values outside
    /// `1/64..=64` are ignored.
    pub fn set_multiplier(&mut self, id: &str, multiplier: Multiplier) {
        if !is_valid_multiplier(multiplier) {
            debug!("Ignoring invalid multiplier {} for '{}'", multiplier, id);
            return;
        }
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state.multiplier = multiplier;
        }
    }

    /// Set a device's own tempo, used in free mode
    pub fn set_free_bpm(&mut self, id: &str, bpm: f64) {
        if !timebase::is_valid_bpm(bpm) {
            debug!("Ignoring invalid free tempo {} for '{}'", bpm, id);
            return;
        }
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state.free_bpm = bpm;
        }
    }

    /// Rewind a device's step counter to 0 without touching its timing,
    /// e.g. when its pattern is switched
    pub fn reset_step(&mut self, id: &str) {
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state.current_step = 0;
        }
    }

    pub fn mode(&self, id: &str) -> Option<TempoMode> {
        self.registry.get(id).map(|e| e.state.mode)
    }

    pub fn multiplier(&self, id: &str) -> Option<Multiplier> {
        self.registry.get(id).map(|e| e.state.multiplier)
    }

    pub fn free_bpm(&self, id: &str) -> Option<f64> {
        self.registry.get(id).map(|e| e.state.free_bpm)
    }
}
