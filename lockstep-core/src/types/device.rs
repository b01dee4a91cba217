//! Devices: the rhythmic units a clock drives
//!
//! A device implements [`Device`]; the clock calls [`Device::schedule`] once
//! per step with the exact time the step should sound. The remaining hooks
//! default to no-ops. Closure-based devices can be built with [`Callbacks`].

use crate::error::ClockError;
use crate::types::tempo::{Multiplier, TempoMode};

/// Receiver of per-step scheduling decisions
///
/// `schedule` must return quickly: it runs inside the scheduling pass and only
/// informs the renderer of what to play and when.
pub trait Device: Send {
    /// Play `step` at absolute time `time` (time source seconds)
    fn schedule(&mut self, time: f64, step: usize);

    /// Whether the clock should deliver delayed [`Device::on_step`] notifications
    fn wants_step_notifications(&self) -> bool {
        false
    }

    /// Fired when the scheduled time of `step` is reached, for UI feedback
    fn on_step(&mut self, _step: usize) {}

    /// Fired when the device starts or resumes
    fn on_start(&mut self) {}

    /// Fired when the device is paused or the transport stops
    fn on_stop(&mut self) {}
}

type ScheduleFn = Box<dyn FnMut(f64, usize) + Send>;
type StepFn = Box<dyn FnMut(usize) + Send>;
type HookFn = Box<dyn FnMut() + Send>;

/// Builder for closure-driven devices
#[derive(Default)]
pub struct Callbacks {
    on_schedule: Option<ScheduleFn>,
    on_step: Option<StepFn>,
    on_start: Option<HookFn>,
    on_stop: Option<HookFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_schedule(mut self, f: impl FnMut(f64, usize) + Send + 'static) -> Self {
        self.on_schedule = Some(Box::new(f));
        self
    }

    pub fn on_step(mut self, f: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_step = Some(Box::new(f));
        self
    }

    pub fn on_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }

    /// Turn the callbacks into a device; `on_schedule` is mandatory
    pub fn into_device(self, id: &str) -> Result<CallbackDevice, ClockError> {
        let on_schedule = self
            .on_schedule
            .ok_or_else(|| ClockError::invalid_spec(id, "missing on_schedule callback"))?;
        Ok(CallbackDevice {
            on_schedule,
            on_step: self.on_step,
            on_start: self.on_start,
            on_stop: self.on_stop,
        })
    }
}

/// A [`Device`] backed by closures
pub struct CallbackDevice {
    on_schedule: ScheduleFn,
    on_step: Option<StepFn>,
    on_start: Option<HookFn>,
    on_stop: Option<HookFn>,
}

impl Device for CallbackDevice {
    fn schedule(&mut self, time: f64, step: usize) {
        (self.on_schedule)(time, step);
    }

    fn wants_step_notifications(&self) -> bool {
        self.on_step.is_some()
    }

    fn on_step(&mut self, step: usize) {
        if let Some(f) = &mut self.on_step {
            f(step);
        }
    }

    fn on_start(&mut self) {
        if let Some(f) = &mut self.on_start {
            f();
        }
    }

    fn on_stop(&mut self) {
        if let Some(f) = &mut self.on_stop {
            f();
        }
    }
}

/// Registration record. Unset fields take the clock's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    pub id: String,
    /// Steps per cycle (clock default, usually 16, when `None`)
    pub step_count: Option<usize>,
    pub mode: TempoMode,
    pub multiplier: Multiplier,
    /// Own tempo for free mode (master tempo at registration when `None`)
    pub free_bpm: Option<f64>,
}

impl DeviceSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_count: None,
            mode: TempoMode::Sync,
            multiplier: Multiplier::from_integer(1),
            free_bpm: None,
        }
    }

    pub fn with_step_count(mut self, steps: usize) -> Self {
        self.step_count = Some(steps);
        self
    }

    pub fn with_mode(mut self, mode: TempoMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_multiplier(mut self, multiplier: Multiplier) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_free_bpm(mut self, bpm: f64) -> Self {
        self.free_bpm = Some(bpm);
        self
    }
}

/// Returned by registration; names the device in per-device calls
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    id: String,
}

impl DeviceHandle {
    pub(crate) fn new(id: String) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl AsRef<str> for DeviceHandle {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

/// Read-only copy of a device's timing state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSnapshot {
    pub id: String,
    pub step_count: usize,
    pub mode: TempoMode,
    /// Multiplier as `(numerator, denominator)`
    pub multiplier: (u32, u32),
    pub free_bpm: f64,
    pub next_event_time: f64,
    pub current_step: usize,
    pub paused: bool,
}
