//! # Lockstep
//!
//! An interactive step sequencer built on [`lockstep_core`]. A background
//! thread polls the clock, voices turn scheduled steps into clicks or MIDI
//! notes, and a REPL edits tempo and devices while everything plays.
//!
//! ## Modules
//!
//! - `audio`: The clock thread, time sources, click renderer, MIDI output and
//!   the pattern voices that connect them.
//! - `commands`: Prefix-matched REPL commands.
//! - `cli`: Command-line arguments.
//! - `logger`: Colored stderr logger for the `log` facade.
//! - `repl`: Session setup and the interactive loop.

pub mod audio;
pub mod cli;
pub mod commands;
pub mod logger;
pub mod repl;

pub use crate::audio::ClockHandle;
pub use crate::repl::SessionOptions;
