use crate::logger;
use crate::repl::SessionOptions;
pub use clap::Parser;
use log::LevelFilter;
use std::str::FromStr;

/// Environment variable read when `--log-level` is absent, e.g. `LOCKSTEP_LOG=debug`
pub const LOG_ENV: &str = "LOCKSTEP_LOG";

/// lockstep - lookahead step sequencer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Master tempo at startup
    #[arg(short, long, default_value_t = 120.0)]
    bpm: f64,
    /// How far ahead each poll schedules steps, in seconds
    #[arg(long, default_value_t = 0.15)]
    lookahead: f64,
    /// Poll cadence in milliseconds
    #[arg(long, default_value_t = 25)]
    poll_ms: u64,
    /// log information level (1:trace 2:debug 3:info 4:warn 5:error 0:none)
    #[arg(short, long)]
    log_level: Option<u8>,
    /// Run on the system clock without opening an audio device
    #[arg(long)]
    no_audio: bool,
    /// Connect to this MIDI output port at startup
    #[arg(short, long)]
    midi_port: Option<String>,
}

impl Args {
    /// The level from `--log-level`, else from the environment, else warn
    pub fn log_filter(&self) -> LevelFilter {
        match self.log_level {
            Some(level) => logger::level_from_number(level),
            None => std::env::var(LOG_ENV)
                .ok()
                .and_then(|value| LevelFilter::from_str(value.trim()).ok())
                .unwrap_or(LevelFilter::Warn),
        }
    }
}

impl From<Args> for SessionOptions {
    fn from(val: Args) -> Self {
        let options = SessionOptions::default();
        SessionOptions {
            bpm: val.bpm,
            schedule_ahead_secs: val.lookahead,
            poll_interval_ms: val.poll_ms,
            audio: !val.no_audio,
            midi_port: val.midi_port.or(options.midi_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["lockstep"]);
        let options = SessionOptions::from(args);
        assert_eq!(options, SessionOptions::default());
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "lockstep",
            "--bpm",
            "98.5",
            "--lookahead",
            "0.2",
            "--poll-ms",
            "40",
            "--no-audio",
            "--midi-port",
            "IAC Driver Bus 1",
            "--log-level",
            "1",
        ]);
        assert_eq!(args.log_filter(), LevelFilter::Trace);

        let options = SessionOptions::from(args);
        assert_eq!(options.bpm, 98.5);
        assert_eq!(options.schedule_ahead_secs, 0.2);
        assert_eq!(options.poll_interval_ms, 40);
        assert!(!options.audio);
        assert_eq!(options.midi_port.as_deref(), Some("IAC Driver Bus 1"));
    }
}
