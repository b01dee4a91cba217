//! The master clock
//!
//! [`Clock`] owns the master tempo, the running flag and the device registry.
//! It is one explicit value rather than process-wide state, so independent
//! clocks can coexist (and be tested side by side).
//!
//! The API is split by concern:
//! - registration and read accessors live here
//! - [`transport`]: global start/stop, per-device pause/resume
//! - [`params`]: tempo, mode and multiplier mutators
//! - [`poll`]: the lookahead scheduling pass and delayed step notifications
//!
//! Nothing here blocks or spawns; the caller decides how often to call
//! [`Clock::poll`].

pub mod params;
pub mod poll;
pub mod transport;

pub use poll::PollOutcome;

use crate::config::ClockConfig;
use crate::error::ClockError;
use crate::registry::{DeviceEntry, DeviceRegistry, DeviceState};
use crate::time_source::TimeSource;
use crate::timebase;
use crate::types::tempo::{is_valid_multiplier, MAX_MULTIPLIER};
use crate::types::{Callbacks, Device, DeviceHandle, DeviceSnapshot, DeviceSpec};
use log::{debug, error};
use poll::StepNotice;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};

/// Lookahead scheduler for a set of step devices
pub struct Clock<T: TimeSource> {
    time_source: T,
    config: ClockConfig,
    master_bpm: f64,
    running: bool,
    registry: DeviceRegistry,
    /// Delayed `on_step` notifications, earliest first
    pending_steps: BinaryHeap<StepNotice>,
    notice_seq: u64,
}

impl<T: TimeSource> Clock<T> {
    /// Create a clock with the default configuration
    pub fn new(time_source: T) -> Self {
        Self::build(time_source, ClockConfig::default())
    }

    /// Create a clock with a custom configuration
    pub fn with_config(time_source: T, config: ClockConfig) -> Result<Self, ClockError> {
        config.validate()?;
        Ok(Self::build(time_source, config))
    }

    fn build(time_source: T, config: ClockConfig) -> Self {
        Self {
            time_source,
            master_bpm: config.initial_bpm,
            config,
            running: false,
            registry: DeviceRegistry::new(),
            pending_steps: BinaryHeap::new(),
            notice_seq: 0,
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Current time source reading
    pub fn now(&self) -> f64 {
        self.time_source.now()
    }

    pub fn time_source(&self) -> &T {
        &self.time_source
    }

    // ── Registration ──────────────────────────────────────────────────────

    /// Register a device. It starts paused and stays inert until the
    /// transport starts or the device is resumed.
    pub fn register(
        &mut self,
        spec: DeviceSpec,
        device: impl Device + 'static,
    ) -> Result<DeviceHandle, ClockError> {
        self.register_boxed(spec, Box::new(device))
    }

    /// Register a closure-driven device; fails if `on_schedule` is missing
    pub fn register_callbacks(
        &mut self,
        spec: DeviceSpec,
        callbacks: Callbacks,
    ) -> Result<DeviceHandle, ClockError> {
        let device = callbacks.into_device(&spec.id)?;
        self.register(spec, device)
    }

    pub fn register_boxed(
        &mut self,
        spec: DeviceSpec,
        device: Box<dyn Device>,
    ) -> Result<DeviceHandle, ClockError> {
        let id = spec.id.trim().to_string();
        if id.is_empty() {
            return Err(ClockError::invalid_spec(&spec.id, "id must not be empty"));
        }
        let step_count = spec.step_count.unwrap_or(self.config.default_step_count);
        if step_count == 0 {
            return Err(ClockError::invalid_spec(&id, "step_count must be positive"));
        }
        if !is_valid_multiplier(spec.multiplier) {
            return Err(ClockError::invalid_spec(
                &id,
                format!(
                    "multiplier must lie between 1/{0} and {0}, got {1}",
                    MAX_MULTIPLIER, spec.multiplier
                ),
            ));
        }
        let free_bpm = spec.free_bpm.unwrap_or(self.master_bpm);
        if !timebase::is_valid_bpm(free_bpm) {
            return Err(ClockError::invalid_spec(
                &id,
                format!("free tempo must be a positive number, got {}", free_bpm),
            ));
        }
        if self.registry.contains(&id) {
            return Err(ClockError::DuplicateDevice(id));
        }

        let state = DeviceState {
            id: id.clone(),
            step_count,
            mode: spec.mode,
            multiplier: spec.multiplier,
            free_bpm,
            next_event_time: self.now(),
            current_step: 0,
            paused: true,
            last_scheduled: None,
            generation: 0,
        };
        debug!(
            "Registered device '{}' ({} steps, {} mode)",
            id,
            step_count,
            spec.mode.name()
        );
        self.registry.insert(DeviceEntry { state, device });
        Ok(DeviceHandle::new(id))
    }

    /// Remove a device. Unknown ids are ignored.
    pub fn unregister(&mut self, id: &str) {
        if self.registry.remove(id).is_some() {
            self.pending_steps.retain(|n| n.device_id != id);
            debug!("Unregistered device '{}'", id);
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn master_bpm(&self) -> f64 {
        self.master_bpm
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Unknown devices report as paused
    pub fn is_device_paused(&self, id: &str) -> bool {
        self.registry.get(id).map_or(true, |e| e.state.paused)
    }

    pub fn device(&self, id: &str) -> Option<DeviceSnapshot> {
        self.registry.get(id).map(|e| e.state.snapshot())
    }

    /// Snapshots of every device, in registration order
    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.registry.iter().map(|e| e.state.snapshot()).collect()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn device_count(&self) -> usize {
        self.registry.len()
    }

    /// Duration of one step at the master tempo
    pub fn master_step_duration(&self) -> f64 {
        timebase::master_step_duration(self.master_bpm)
    }

    /// Duration of one step for a device, `None` for unknown ids
    pub fn device_step_duration(&self, id: &str) -> Option<f64> {
        self.registry
            .get(id)
            .map(|e| e.state.step_duration(self.master_bpm))
    }
}

/// Run a device hook, containing any panic so one misbehaving device cannot
/// abort the pass for the others. Returns `false` if the hook panicked.
fn guarded(
    id: &str,
    hook: &str,
    device: &mut Box<dyn Device>,
    f: impl FnOnce(&mut dyn Device),
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| f(device.as_mut()))) {
        Ok(()) => true,
        Err(_) => {
            error!("Device '{}' panicked in {}", id, hook);
            false
        }
    }
}
