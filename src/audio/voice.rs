//! Step devices that render a hit pattern
//!
//! A [`Voice`] plays its pattern through a click or a MIDI note and tracks
//! which step is currently sounding for display.

use crate::audio::click::ClickSender;
use crate::audio::midi::MidiOutputHandle;
use lockstep_core::Device;
use log::warn;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which steps of a cycle sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    hits: Vec<bool>,
}

impl Pattern {
    /// A hit on every beat (every fourth step)
    pub fn four_on_the_floor(steps: usize) -> Self {
        Self {
            hits: (0..steps).map(|i| i % 4 == 0).collect(),
        }
    }

    /// Parse a pattern like `x..x..x.`: `x`, `X` or `1` is a hit, `.`, `-`
    /// or `0` a rest
    pub fn parse(s: &str) -> Result<Self, String> {
        let hits = s
            .chars()
            .map(|c| match c {
                'x' | 'X' | '1' => Ok(true),
                '.' | '-' | '0' => Ok(false),
                other => Err(format!("Invalid pattern character '{}'", other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if hits.is_empty() {
            return Err("Pattern must not be empty".to_string());
        }
        Ok(Self { hits })
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Whether `step` sounds; patterns shorter than the cycle repeat
    pub fn is_hit(&self, step: usize) -> bool {
        !self.hits.is_empty() && self.hits[step % self.hits.len()]
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for &hit in &self.hits {
            write!(f, "{}", if hit { 'x' } else { '.' })?;
        }
        Ok(())
    }
}

/// Step currently sounding, shared with whoever displays it
#[derive(Debug, Clone)]
pub struct Playhead(Arc<AtomicUsize>);

const IDLE: usize = usize::MAX;

impl Playhead {
    pub fn new() -> Self {
        Self(Arc::new(AtomicUsize::new(IDLE)))
    }

    pub fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Relaxed) {
            IDLE => None,
            step => Some(step),
        }
    }

    fn set(&self, step: usize) {
        self.0.store(step, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.0.store(IDLE, Ordering::Relaxed);
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a voice's hits go
pub enum Output {
    Click {
        sender: ClickSender,
        frequency: f32,
    },
    Midi {
        handle: Arc<MidiOutputHandle>,
        channel: u8,
        note: u8,
    },
    /// Keep time without making sound
    Silent,
}

impl Output {
    pub fn name(&self) -> &'static str {
        match self {
            Output::Click { .. } => "click",
            Output::Midi { .. } => "midi",
            Output::Silent => "silent",
        }
    }
}

/// Length of each MIDI note
const GATE_SECS: f64 = 0.05;

/// A pattern-playing device
pub struct Voice {
    pattern: Pattern,
    output: Output,
    playhead: Playhead,
}

impl Voice {
    pub fn new(pattern: Pattern, output: Output) -> Self {
        Self {
            pattern,
            output,
            playhead: Playhead::new(),
        }
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead.clone()
    }
}

impl Device for Voice {
    fn schedule(&mut self, time: f64, step: usize) {
        if !self.pattern.is_hit(step) {
            return;
        }
        // Accent the downbeats
        let accent = step % 4 == 0;
        match &self.output {
            Output::Click { sender, frequency } => {
                let (frequency, gain) = if step == 0 {
                    (frequency * 2.0, 1.0)
                } else if accent {
                    (*frequency, 0.8)
                } else {
                    (*frequency, 0.5)
                };
                sender.schedule(time, frequency, gain);
            }
            Output::Midi {
                handle,
                channel,
                note,
            } => {
                let velocity = if accent { 110 } else { 80 };
                if let Err(e) = handle.schedule_note(time, GATE_SECS, *channel, *note, velocity) {
                    warn!("Dropped MIDI note: {}", e);
                }
            }
            Output::Silent => {}
        }
    }

    fn wants_step_notifications(&self) -> bool {
        true
    }

    fn on_step(&mut self, step: usize) {
        self.playhead.set(step);
    }

    fn on_start(&mut self) {
        self.playhead.clear();
    }

    fn on_stop(&mut self) {
        self.playhead.clear();
        if let Output::Midi {
            handle, channel, ..
        } = &self.output
        {
            if let Err(e) = handle.silence(*channel) {
                warn!("Failed to silence MIDI channel {}: {}", channel + 1, e);
            }
        }
    }
}
