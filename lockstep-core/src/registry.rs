//! Device registry
//!
//! Holds every registered device together with its mutable timing state.
//! Lookup is by id; iteration follows registration order, which fixes the
//! order in which devices are visited during a scheduling pass.

use crate::timebase;
use crate::types::{Device, DeviceSnapshot, Multiplier, TempoMode};

/// Mutable timing state of one device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub id: String,
    pub step_count: usize,
    pub mode: TempoMode,
    pub multiplier: Multiplier,
    pub free_bpm: f64,
    /// Absolute time at which `current_step` is due
    pub next_event_time: f64,
    /// Next step to schedule, always in `[0, step_count)`
    pub current_step: usize,
    pub paused: bool,
    /// Time handed to the most recent `schedule` call since the last reset
    pub last_scheduled: Option<f64>,
    /// Transport generation; pending step notifications from an older
    /// generation are stale
    pub generation: u64,
}

impl DeviceState {
    /// Step duration given the current master tempo
    pub fn step_duration(&self, master_bpm: f64) -> f64 {
        timebase::device_step_duration(master_bpm, self.mode, self.multiplier, self.free_bpm)
    }

    /// Rewind to step 0 with the next event due at `now`
    pub fn rewind(&mut self, now: f64) {
        self.next_event_time = now;
        self.current_step = 0;
        self.last_scheduled = None;
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id.clone(),
            step_count: self.step_count,
            mode: self.mode,
            multiplier: (*self.multiplier.numer(), *self.multiplier.denom()),
            free_bpm: self.free_bpm,
            next_event_time: self.next_event_time,
            current_step: self.current_step,
            paused: self.paused,
        }
    }
}

/// A registered device and its state
pub struct DeviceEntry {
    pub state: DeviceState,
    pub device: Box<dyn Device>,
}

/// Registration-ordered collection of devices
#[derive(Default)]
pub struct DeviceRegistry {
    entries: Vec<DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.state.id == id)
    }

    /// Append a device; the caller has already checked the id is free
    pub fn insert(&mut self, entry: DeviceEntry) {
        self.entries.push(entry);
    }

    /// Remove a device, keeping the order of the others
    pub fn remove(&mut self, id: &str) -> Option<DeviceEntry> {
        self.position(id).map(|i| self.entries.remove(i))
    }

    pub fn get(&self, id: &str) -> Option<&DeviceEntry> {
        self.entries.iter().find(|e| e.state.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DeviceEntry> {
        self.entries.iter_mut().find(|e| e.state.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceEntry> {
        self.entries.iter_mut()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.state.id.clone()).collect()
    }
}
