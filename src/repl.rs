//! REPL (Read-Eval-Print Loop) for a Lockstep session

use crate::audio::click::ClickEngine;
use crate::audio::clock::ClockHandle;
use crate::audio::midi::MidiOutputHandle;
use crate::audio::time::{SharedTime, SystemTimeSource};
use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use anyhow::Result;
use colored::*;
use lockstep_core::ClockConfig;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// Settings a session is opened with
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub bpm: f64,
    pub schedule_ahead_secs: f64,
    pub poll_interval_ms: u64,
    /// Open the default audio output and use its sample clock
    pub audio: bool,
    pub midi_port: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let config = ClockConfig::default();
        Self {
            bpm: config.initial_bpm,
            schedule_ahead_secs: config.schedule_ahead_secs,
            poll_interval_ms: config.poll_interval_ms,
            audio: true,
            midi_port: None,
        }
    }
}

impl SessionOptions {
    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig::default()
            .with_initial_bpm(self.bpm)
            .with_schedule_ahead(self.schedule_ahead_secs)
            .with_poll_interval_ms(self.poll_interval_ms)
    }
}

/// Everything a running session owns
pub struct Session {
    /// Kept alive for the stream; dropping it stops the sound and the clock's time
    engine: Option<ClickEngine>,
    ctx: CommandContext,
    registry: CommandRegistry,
}

impl Session {
    /// Open the outputs and start the clock thread
    ///
    /// Audio and MIDI failures are logged and the session continues
    /// without them. An invalid clock configuration is an error.
    pub fn open(options: &SessionOptions) -> Result<Self> {
        let engine = if options.audio {
            open_audio()
        } else {
            None
        };
        let time: SharedTime = match &engine {
            Some(engine) => Arc::new(engine.time_source()),
            None => Arc::new(SystemTimeSource::new()),
        };

        let clock = ClockHandle::spawn(time.clone(), options.clock_config())?;
        let mut ctx = CommandContext::new(Arc::new(clock));
        if let Some(engine) = &engine {
            ctx = ctx.with_click(engine.sender());
        }

        match MidiOutputHandle::new(time) {
            Ok(midi) => {
                if let Some(port) = &options.midi_port {
                    match midi.connect(port) {
                        Ok(name) => info!("Connected to MIDI port {}", name),
                        Err(e) => warn!("Could not connect to MIDI port '{}': {}", port, e),
                    }
                }
                ctx = ctx.with_midi(Arc::new(midi));
            }
            Err(e) => warn!("MIDI output unavailable: {}", e),
        }

        Ok(Self {
            engine,
            ctx,
            registry: create_registry(),
        })
    }

    /// Whether clicks are rendered to an audio device
    pub fn has_audio(&self) -> bool {
        self.engine.is_some()
    }

    /// Run one line of input
    pub fn execute(&mut self, line: &str) -> CommandResult {
        self.registry.execute(line.trim(), &mut self.ctx)
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Stop the transport, then the audio stream
    pub fn close(&self) -> Result<()> {
        self.ctx.clock.stop();
        if let Some(engine) = &self.engine {
            engine.pause()?;
        }
        Ok(())
    }
}

fn open_audio() -> Option<ClickEngine> {
    let engine = match ClickEngine::new() {
        Ok(engine) => engine,
        Err(e) => {
            warn!("Audio output unavailable, using the system clock: {}", e);
            return None;
        }
    };
    // A stream that never plays never advances its clock
    match engine.play() {
        Ok(()) => Some(engine),
        Err(e) => {
            warn!("Audio stream did not start, using the system clock: {}", e);
            None
        }
    }
}

/// Interactive REPL over a session
pub struct Repl {
    editor: DefaultEditor,
    session: Session,
}

impl Repl {
    pub fn new(options: &SessionOptions) -> Result<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize line editor: {}", e))?;
        Ok(Self {
            editor,
            session: Session::open(options)?,
        })
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎵".bright_yellow(),
            "Lockstep Sequencer".bright_cyan().bold()
        );
        if !self.session.has_audio() {
            println!("{}", "No audio output: clicks are silent".yellow());
        }
        println!(
            "Try: {}, {}, {}",
            "add kick".cyan(),
            "start".cyan(),
            "tempo 140".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        loop {
            let prompt = format!("{} ", "lockstep>".bright_magenta().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    match self.session.execute(line) {
                        CommandResult::Success => {}
                        CommandResult::Message(msg) => println!("{}", msg),
                        CommandResult::Exit => {
                            println!("{} 🎵", "Goodbye!".bright_cyan());
                            break;
                        }
                        CommandResult::Error(e) => {
                            println!("{} {}", "Error:".bright_red().bold(), e.red());
                        }
                        CommandResult::NotACommand => {
                            println!(
                                "{} '{}' (type '{}')",
                                "Unknown command".bright_red().bold(),
                                line,
                                "help".bright_green()
                            );
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("{} 🎵", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    println!(
                        "{} {}",
                        "Error reading input:".bright_red().bold(),
                        err.to_string().red()
                    );
                }
            }
        }

        self.session.close()
    }
}

/// Convenience function to start the REPL
pub fn start(options: SessionOptions) -> Result<()> {
    let mut repl = Repl::new(&options)?;
    repl.run()
}
