//! Transport control
//!
//! Global `Stopped ⇄ Running` plus per-device `Paused ⇄ Active`.
//!
//! Every transition bumps the affected devices' generation, which retires
//! any `on_step` notification queued before it.

use super::{guarded, Clock};
use crate::time_source::TimeSource;
use log::{debug, info};

impl<T: TimeSource> Clock<T> {
    /// Start every device from step 0 at the current time.
    ///
    /// Returns `true` if the clock went from stopped to running; a second
    /// call while running changes nothing.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;

        let now = self.now();
        for entry in self.registry.iter_mut() {
            entry.state.paused = false;
            entry.state.rewind(now);
            entry.state.generation += 1;
            guarded(&entry.state.id, "on_start", &mut entry.device, |d| d.on_start());
        }
        info!(
            "Transport started at {:.3}s ({} devices, {:.1} BPM)",
            now,
            self.registry.len(),
            self.master_bpm
        );
        true
    }

    /// Stop the transport and notify every device.
    ///
    /// Devices come out of a stop unpaused, not paused: a later lazy start
    /// through [`Clock::resume_device`] brings all of them back, not just the
    /// resumed one. Already scheduled events are not retracted.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.pending_steps.clear();

        for entry in self.registry.iter_mut() {
            entry.state.paused = false;
            entry.state.generation += 1;
            guarded(&entry.state.id, "on_stop", &mut entry.device, |d| d.on_stop());
        }
        info!("Transport stopped at {:.3}s", self.now());
        true
    }

    /// Silence one device; the others keep playing. Unknown ids are ignored.
    pub fn pause_device(&mut self, id: &str) {
        let Some(entry) = self.registry.get_mut(id) else {
            return;
        };
        entry.state.paused = true;
        entry.state.generation += 1;
        guarded(&entry.state.id, "on_stop", &mut entry.device, |d| d.on_stop());
        debug!("Paused device '{}'", id);
    }

    /// Restart one device from step 0 at the current time.
    ///
    /// If the transport is stopped this also starts it, without resetting
    /// the other devices. Returns `true` in that case.
    pub fn resume_device(&mut self, id: &str) -> bool {
        let now = self.now();
        let Some(entry) = self.registry.get_mut(id) else {
            return false;
        };
        entry.state.paused = false;
        entry.state.rewind(now);
        entry.state.generation += 1;
        guarded(&entry.state.id, "on_start", &mut entry.device, |d| d.on_start());
        debug!("Resumed device '{}' at {:.3}s", id, now);

        if self.running {
            return false;
        }
        self.running = true;
        info!("Transport started by device '{}'", id);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::time_source::ManualTimeSource;
    use crate::types::{Callbacks, DeviceSpec};
    use crate::Clock;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn hooks(id: &'static str, log: &Log) -> Callbacks {
        let (a, b) = (log.clone(), log.clone());
        Callbacks::new()
            .on_schedule(|_, _| {})
            .on_start(move || a.lock().unwrap().push(format!("{id} start")))
            .on_stop(move || b.lock().unwrap().push(format!("{id} stop")))
    }

    fn setup() -> (Clock<ManualTimeSource>, ManualTimeSource, Log) {
        let time = ManualTimeSource::new();
        let mut clock = Clock::new(time.clone());
        let log: Log = Arc::default();
        clock.register_callbacks(DeviceSpec::new("tb303"), hooks("tb303", &log)).unwrap();
        clock.register_callbacks(DeviceSpec::new("tr808"), hooks("tr808", &log)).unwrap();
        (clock, time, log)
    }

    #[test]
    fn test_start_unpauses_and_rewinds_everything() {
        let (mut clock, time, log) = setup();
        time.set(2.0);
        assert!(clock.start());
        assert!(clock.is_running());

        for id in ["tb303", "tr808"] {
            let snap = clock.device(id).unwrap();
            assert!(!snap.paused);
            assert_eq!(snap.current_step, 0);
            assert_eq!(snap.next_event_time, 2.0);
        }
        assert_eq!(*log.lock().unwrap(), vec!["tb303 start", "tr808 start"]);
    }

    #[test]
    fn test_start_while_running_is_a_noop() {
        let (mut clock, time, log) = setup();
        clock.start();
        clock.poll();
        let before = clock.device("tb303").unwrap();

        time.advance(0.05);
        assert!(!clock.start());
        assert_eq!(clock.device("tb303").unwrap(), before);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stop_clears_pauses_and_notifies() {
        let (mut clock, _time, log) = setup();
        clock.start();
        clock.pause_device("tb303");
        assert!(clock.stop());
        assert!(!clock.is_running());

        // Stopping leaves devices unpaused rather than paused
        assert!(!clock.is_device_paused("tb303"));
        assert!(!clock.is_device_paused("tr808"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["tb303 start", "tr808 start", "tb303 stop", "tb303 stop", "tr808 stop"]
        );
        assert!(!clock.stop());
    }

    #[test]
    fn test_pause_and_resume_single_device() {
        let (mut clock, time, _log) = setup();
        clock.start();
        clock.pause_device("tr808");
        assert!(clock.is_device_paused("tr808"));
        assert!(!clock.is_device_paused("tb303"));
        assert!(clock.is_running());

        time.set(1.0);
        assert!(!clock.resume_device("tr808"));
        let snap = clock.device("tr808").unwrap();
        assert!(!snap.paused);
        assert_eq!(snap.next_event_time, 1.0);
        assert_eq!(snap.current_step, 0);
    }

    #[test]
    fn test_resume_lazily_starts_the_transport() {
        let (mut clock, _time, log) = setup();
        assert!(clock.resume_device("tb303"));
        assert!(clock.is_running());
        assert!(!clock.is_device_paused("tb303"));
        // Other devices stay as they were
        assert!(clock.is_device_paused("tr808"));
        assert_eq!(*log.lock().unwrap(), vec!["tb303 start"]);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let (mut clock, _time, log) = setup();
        clock.pause_device("ghost");
        assert!(!clock.resume_device("ghost"));
        assert!(!clock.is_running());
        assert!(log.lock().unwrap().is_empty());
    }
}
