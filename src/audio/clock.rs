//! Background poll loop for a [`Clock`]
//!
//! [`ClockHandle`] moves a clock onto its own thread and wakes it every poll
//! interval while the transport runs. Between polls the thread also wakes for
//! the next pending step notification, so `on_step` fires close to the time
//! the step actually sounds.
//!
//! The clock sits behind a single mutex shared by the thread and every
//! caller, so a tempo change always sees a consistent view of the devices.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lockstep_core::{
    Callbacks, Clock, ClockConfig, ClockError, Device, DeviceHandle, DeviceSnapshot, DeviceSpec,
    Multiplier, TempoMode, TimeSource,
};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type SharedClock = Arc<Mutex<Clock<Box<dyn TimeSource>>>>;

/// Commands that can be sent to the poll thread
#[derive(Debug)]
enum ClockCommand {
    /// State changed; poll right away
    Wake,
    Shutdown,
}

/// A clock driven by its own poll thread
///
/// Device hooks run with the clock locked; they must not call back into the
/// handle.
pub struct ClockHandle {
    clock: SharedClock,
    command_tx: Sender<ClockCommand>,
    thread: Option<JoinHandle<()>>,
}

impl ClockHandle {
    /// Build a clock on `time_source` and start its (idle) poll thread
    pub fn spawn(time_source: impl TimeSource + 'static, config: ClockConfig) -> Result<Self> {
        let time_source: Box<dyn TimeSource> = Box::new(time_source);
        let clock = Clock::with_config(time_source, config)?;
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let clock = Arc::new(Mutex::new(clock));
        let (command_tx, command_rx) = crossbeam_channel::bounded(64);

        let shared = clock.clone();
        let thread = thread::Builder::new()
            .name("lockstep-clock".to_string())
            .spawn(move || PollThread::new(shared, command_rx, poll_interval).run())
            .map_err(|e| anyhow!("Failed to spawn clock thread: {}", e))?;

        Ok(Self {
            clock,
            command_tx,
            thread: Some(thread),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Clock<Box<dyn TimeSource>>> {
        lock_clock(&self.clock)
    }

    fn wake(&self) {
        let _ = self.command_tx.try_send(ClockCommand::Wake);
    }

    /// Run `f` with exclusive access to the clock
    pub fn with_clock<R>(&self, f: impl FnOnce(&mut Clock<Box<dyn TimeSource>>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn register(
        &self,
        spec: DeviceSpec,
        device: impl Device + 'static,
    ) -> Result<DeviceHandle, ClockError> {
        self.lock().register(spec, device)
    }

    pub fn register_callbacks(
        &self,
        spec: DeviceSpec,
        callbacks: Callbacks,
    ) -> Result<DeviceHandle, ClockError> {
        self.lock().register_callbacks(spec, callbacks)
    }

    pub fn unregister(&self, id: &str) {
        self.lock().unregister(id);
    }

    pub fn start(&self) -> bool {
        let started = self.lock().start();
        if started {
            self.wake();
        }
        started
    }

    pub fn stop(&self) -> bool {
        let stopped = self.lock().stop();
        if stopped {
            self.wake();
        }
        stopped
    }

    pub fn pause_device(&self, id: &str) {
        self.lock().pause_device(id);
    }

    /// Resume one device, starting the transport if needed
    pub fn resume_device(&self, id: &str) -> bool {
        let started = self.lock().resume_device(id);
        // A resumed device is due now, whether or not the clock was running
        self.wake();
        started
    }

    pub fn set_master_bpm(&self, bpm: f64) {
        self.lock().set_master_bpm(bpm);
        self.wake();
    }

    pub fn set_mode(&self, id: &str, mode: TempoMode) {
        self.lock().set_mode(id, mode);
    }

    pub fn set_multiplier(&self, id: &str, multiplier: Multiplier) {
        self.lock().set_multiplier(id, multiplier);
    }

    pub fn set_free_bpm(&self, id: &str, bpm: f64) {
        self.lock().set_free_bpm(id, bpm);
    }

    pub fn reset_step(&self, id: &str) {
        self.lock().reset_step(id);
    }

    pub fn master_bpm(&self) -> f64 {
        self.lock().master_bpm()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn is_device_paused(&self, id: &str) -> bool {
        self.lock().is_device_paused(id)
    }

    pub fn device(&self, id: &str) -> Option<DeviceSnapshot> {
        self.lock().device(id)
    }

    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.lock().devices()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.lock().device_ids()
    }

    pub fn now(&self) -> f64 {
        self.lock().now()
    }

    pub fn config(&self) -> ClockConfig {
        *self.lock().config()
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(ClockCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A panicking device must not wedge every later caller, so a poisoned lock
/// is taken over as is
fn lock_clock(clock: &SharedClock) -> MutexGuard<'_, Clock<Box<dyn TimeSource>>> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The poll loop itself
struct PollThread {
    clock: SharedClock,
    command_rx: Receiver<ClockCommand>,
    poll_interval: Duration,
}

impl PollThread {
    fn new(clock: SharedClock, command_rx: Receiver<ClockCommand>, poll_interval: Duration) -> Self {
        Self {
            clock,
            command_rx,
            poll_interval,
        }
    }

    fn run(&mut self) {
        debug!("Clock thread started");
        let mut next_poll = Instant::now();

        loop {
            let wait = self.service(&mut next_poll);

            // Block while stopped; otherwise sleep until the next deadline
            let command = match wait {
                None => match self.command_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
                Some(timeout) => match self.command_rx.recv_timeout(timeout) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };

            match command {
                Some(ClockCommand::Shutdown) => break,
                Some(ClockCommand::Wake) => next_poll = Instant::now(),
                None => {}
            }
        }
        info!("Clock thread exiting");
    }

    /// Poll if due and fire due notifications. Returns how long to wait
    /// before the next deadline, or `None` while the transport is stopped.
    fn service(&self, next_poll: &mut Instant) -> Option<Duration> {
        let mut clock = lock_clock(&self.clock);
        if !clock.is_running() {
            return None;
        }

        let now = Instant::now();
        if now >= *next_poll {
            clock.poll();
            // Late polls resync rather than firing a burst to catch up
            *next_poll = (*next_poll + self.poll_interval).max(now);
        }
        clock.fire_due_steps();

        let mut wait = next_poll.saturating_duration_since(Instant::now());
        if let Some(at) = clock.next_step_notice_at() {
            let delta = (at - clock.now()).max(0.0);
            wait = wait.min(Duration::from_secs_f64(delta));
        }
        Some(wait)
    }
}
