//! The lookahead scheduling pass
//!
//! Each call to [`Clock::poll`] walks the devices in registration order and
//! emits every step whose time falls before `now + schedule_ahead`. Emitted
//! times are clamped to at least `now + epsilon` so the renderer never
//! receives an event in the past.
//!
//! Devices that asked for step notifications get a [`StepNotice`] queued per
//! emitted step. [`Clock::fire_due_steps`] delivers them once their time has
//! come, unless a transport change has retired them in the meantime.

use super::{guarded, Clock};
use crate::time_source::TimeSource;
use log::{trace, warn};
use std::cmp::Ordering;

/// Most steps one device may emit or drop in a single pass
///
/// The remainder is picked up by the next pass.
pub const MAX_STEPS_PER_PASS: usize = 4096;

/// Result of one scheduling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The transport is stopped; nothing was looked at
    Stopped,
    /// The pass ran and handed `events` steps to devices
    Scheduled { events: usize },
}

impl PollOutcome {
    /// Whether the poll loop should keep its cadence
    pub fn should_continue(&self) -> bool {
        matches!(self, PollOutcome::Scheduled { .. })
    }

    pub fn events(&self) -> usize {
        match self {
            PollOutcome::Stopped => 0,
            PollOutcome::Scheduled { events } => *events,
        }
    }
}

/// A delayed `on_step` notification
#[derive(Debug, Clone)]
pub(crate) struct StepNotice {
    pub fire_at: f64,
    /// Emission order, breaks ties between equal times
    pub seq: u64,
    pub device_id: String,
    pub step: usize,
    /// Device generation when the step was emitted
    pub generation: u64,
}

impl PartialEq for StepNotice {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StepNotice {}

impl PartialOrd for StepNotice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepNotice {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior (earliest first)
        other
            .fire_at
            .total_cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T: TimeSource> Clock<T> {
    /// Run one scheduling pass.
    ///
    /// Paused devices are skipped. A device whose `schedule` panics is
    /// paused and left alone until resumed; the other devices are still
    /// served in the same pass.
    pub fn poll(&mut self) -> PollOutcome {
        if !self.running {
            return PollOutcome::Stopped;
        }
        let now = self.now();
        let horizon = now + self.config.schedule_ahead_secs;
        let earliest = now + self.config.epsilon_secs;
        let master_bpm = self.master_bpm;
        let mut events = 0;

        for entry in self.registry.iter_mut() {
            let state = &mut entry.state;
            if state.paused {
                continue;
            }
            let step_duration = state.step_duration(master_bpm);
            let mut skipped = 0usize;
            let mut visited = 0usize;

            while state.next_event_time < horizon {
                if visited == MAX_STEPS_PER_PASS {
                    warn!(
                        "Device '{}' hit {} steps in one pass at {}s per step",
                        state.id, MAX_STEPS_PER_PASS, step_duration
                    );
                    break;
                }
                visited += 1;
                let next = state.next_event_time;
                let following = next + step_duration;
                if following <= next {
                    warn!(
                        "Device '{}' step of {}s does not advance time at {:.3}s",
                        state.id, step_duration, next
                    );
                    break;
                }
                // After a stall, steps that would pile up on `earliest` are
                // dropped so emitted times stay strictly increasing
                if following <= earliest {
                    state.next_event_time = following;
                    skipped += 1;
                    continue;
                }

                let time = next.max(earliest);
                let step = state.current_step;
                if !guarded(&state.id, "schedule", &mut entry.device, |d| {
                    d.schedule(time, step)
                }) {
                    state.paused = true;
                    state.generation += 1;
                    warn!("Paused device '{}' after a failed schedule", state.id);
                    break;
                }
                events += 1;
                trace!("'{}' step {} at {:.4}s", state.id, step, time);

                if entry.device.wants_step_notifications() {
                    self.notice_seq += 1;
                    self.pending_steps.push(StepNotice {
                        fire_at: time,
                        seq: self.notice_seq,
                        device_id: state.id.clone(),
                        step,
                        generation: state.generation,
                    });
                }

                state.last_scheduled = Some(time);
                state.next_event_time = following;
                state.current_step = (step + 1) % state.step_count;
            }

            if skipped > 0 {
                warn!(
                    "Device '{}' fell behind; dropped {} overdue steps",
                    state.id, skipped
                );
            }
        }
        PollOutcome::Scheduled { events }
    }

    /// Deliver every queued step notification that is due.
    ///
    /// A notice only fires while the clock runs, its device is still
    /// registered and unpaused, and no transport change happened since the
    /// step was emitted. Returns the number delivered.
    pub fn fire_due_steps(&mut self) -> usize {
        let now = self.now();
        let mut fired = 0;
        while self.pending_steps.peek().is_some_and(|n| n.fire_at <= now) {
            let Some(notice) = self.pending_steps.pop() else {
                break;
            };
            if !self.running {
                continue;
            }
            let Some(entry) = self.registry.get_mut(&notice.device_id) else {
                continue;
            };
            if entry.state.paused || entry.state.generation != notice.generation {
                continue;
            }
            let step = notice.step;
            if guarded(&entry.state.id, "on_step", &mut entry.device, |d| {
                d.on_step(step)
            }) {
                fired += 1;
            }
        }
        fired
    }

    /// Time of the earliest queued step notification
    pub fn next_step_notice_at(&self) -> Option<f64> {
        self.pending_steps.peek().map(|n| n.fire_at)
    }

    pub fn pending_step_notices(&self) -> usize {
        self.pending_steps.len()
    }
}
