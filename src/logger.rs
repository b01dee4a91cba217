//! Colored stderr logger for the `log` facade
//!
//! Lines are written to stderr so they never interleave with the REPL's
//! command output on stdout.

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::OnceLock;

pub(crate) struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    fn paint(level: Level) -> ColoredString {
        let name = level.as_str();
        match level {
            Level::Error => name.bright_red().bold(),
            Level::Warn => name.yellow(),
            Level::Info => name.white(),
            Level::Debug => name.cyan(),
            Level::Trace => name.blue(),
        }
    }

    fn format(record: &Record) -> String {
        format!(
            "{}:{} -- {}",
            Self::paint(record.level()),
            record.target().dimmed(),
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

pub(crate) static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install the global logger
///
/// Only the first call sets the level; later calls return the error from
/// [`log::set_logger`].
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = GLOBAL_LOGGER.get_or_init(|| Logger::new(level));
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

/// Map a numeric verbosity to a level filter
///
/// 1: trace, 2: debug, 3: info, 4: warn, 5: error, anything else: off.
pub fn level_from_number(level: u8) -> LevelFilter {
    match level {
        1 => LevelFilter::Trace,
        2 => LevelFilter::Debug,
        3 => LevelFilter::Info,
        4 => LevelFilter::Warn,
        5 => LevelFilter::Error,
        _ => LevelFilter::Off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_numbers() {
        assert_eq!(level_from_number(1), LevelFilter::Trace);
        assert_eq!(level_from_number(4), LevelFilter::Warn);
        assert_eq!(level_from_number(5), LevelFilter::Error);
        assert_eq!(level_from_number(0), LevelFilter::Off);
        assert_eq!(level_from_number(9), LevelFilter::Off);
    }

    #[test]
    fn test_enabled_respects_level() {
        let logger = Logger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(Level::Warn).build();
        let info = Metadata::builder().level(Level::Info).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));
    }

    #[test]
    fn test_format_includes_target() {
        colored::control::set_override(false);
        let line = Logger::format(
            &Record::builder()
                .args(format_args!("late poll"))
                .level(Level::Warn)
                .target("lockstep_core::clock")
                .build(),
        );
        assert_eq!(line, "WARN:lockstep_core::clock -- late poll");
    }
}
