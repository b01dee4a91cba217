//! Timebase math
//!
//! Pure step-duration functions. A step is a sixteenth note, so one beat
//! holds [`STEPS_PER_BEAT`] steps.

use crate::types::{Multiplier, TempoMode};
use num_traits::ToPrimitive;

/// Sixteenth-note steps per quarter-note beat
pub const STEPS_PER_BEAT: f64 = 4.0;

/// A tempo is usable when it is finite and strictly positive
#[inline]
pub fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Duration of one step at `bpm`, in seconds
#[inline]
pub fn step_duration(bpm: f64) -> f64 {
    60.0 / bpm / STEPS_PER_BEAT
}

/// Duration of one step at the master tempo
#[inline]
pub fn master_step_duration(master_bpm: f64) -> f64 {
    step_duration(master_bpm)
}

/// Convert a multiplier to f64 for timing math
#[inline]
pub fn multiplier_to_f64(multiplier: Multiplier) -> f64 {
    multiplier.to_f64().unwrap_or(1.0)
}

/// Duration of one step for a device.
///
/// Free devices run at their own tempo; sync devices divide the master step
/// by their multiplier, so `2` plays twice as fast and `1/2` half as fast.
pub fn device_step_duration(
    master_bpm: f64,
    mode: TempoMode,
    multiplier: Multiplier,
    free_bpm: f64,
) -> f64 {
    match mode {
        TempoMode::Free => step_duration(free_bpm),
        TempoMode::Sync => master_step_duration(master_bpm) / multiplier_to_f64(multiplier),
    }
}
