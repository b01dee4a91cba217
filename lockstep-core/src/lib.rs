//! # Lockstep Core
//!
//! Lookahead scheduling for step-sequencer devices that share a master
//! tempo or run at their own free tempo.
//!
//! A [`Clock`] is polled on a coarse, jittery cadence. Each poll reads a
//! precise [`TimeSource`], looks a fixed horizon into the future and hands
//! every due step to its [`Device`] stamped with the exact time at which the
//! renderer should play it. The poll itself carries no precision.
//!
//! This crate has no audio, MIDI or threading dependencies; the `lockstep`
//! crate drives a `Clock` from a background thread.
//!
//! ## Features
//!
//! - **serde**: Serialize/deserialize configuration, tempo modes and device
//!   snapshots
//!
//! ## Example
//!
//! ```
//! use lockstep_core::{Callbacks, Clock, DeviceSpec, ManualTimeSource};
//!
//! let time = ManualTimeSource::new();
//! let mut clock = Clock::new(time.clone());
//! clock
//!     .register_callbacks(
//!         DeviceSpec::new("bass"),
//!         Callbacks::new().on_schedule(|at, step| println!("step {step} at {at:.3}s")),
//!     )
//!     .unwrap();
//!
//! clock.start();
//! clock.poll();
//! time.advance(0.125);
//! clock.poll();
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod time_source;
pub mod timebase;
pub mod types;

pub use clock::{Clock, PollOutcome};
pub use config::ClockConfig;
pub use error::ClockError;
pub use time_source::{ManualTimeSource, TimeSource};
pub use types::{
    Callbacks, CallbackDevice, Device, DeviceHandle, DeviceSnapshot, DeviceSpec, Multiplier,
    TempoMode,
};
