//! Command registry for REPL commands
//!
//! Each command is a plain function registered under a prefix; the longest
//! matching prefix wins, so `midi connect` is found before `midi`.

pub mod device;
pub mod general;
pub mod midi;
pub mod transport;

use crate::audio::click::ClickSender;
use crate::audio::clock::ClockHandle;
use crate::audio::midi::MidiOutputHandle;
use crate::audio::voice::Playhead;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of executing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// No command matches the input
    NotACommand,
    /// Error occurred
    Error(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    pub clock: Arc<ClockHandle>,
    /// Present when an audio stream is open
    pub click: Option<ClickSender>,
    pub midi_handle: Option<Arc<MidiOutputHandle>>,
    /// Playheads of the voices added from the REPL
    pub playheads: HashMap<String, Playhead>,
}

impl CommandContext {
    pub fn new(clock: Arc<ClockHandle>) -> Self {
        Self {
            clock,
            click: None,
            midi_handle: None,
            playheads: HashMap::new(),
        }
    }

    pub fn with_click(mut self, click: ClickSender) -> Self {
        self.click = Some(click);
        self
    }

    pub fn with_midi(mut self, midi_handle: Arc<MidiOutputHandle>) -> Self {
        self.midi_handle = Some(midi_handle);
        self
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Transport
    registry.register("start", transport::cmd_start);
    registry.register("stop", transport::cmd_stop);
    registry.register("tempo", transport::cmd_tempo);
    registry.register("status", transport::cmd_status);

    // Devices
    registry.register("add", device::cmd_add);
    registry.register("remove", device::cmd_remove);
    registry.register("pause", device::cmd_pause);
    registry.register("resume", device::cmd_resume);
    registry.register("mode", device::cmd_mode);
    registry.register("mult", device::cmd_mult);
    registry.register("free", device::cmd_free);
    registry.register("reset", device::cmd_reset);
    registry.register("devices", device::cmd_devices);

    // MIDI
    registry.register("midi devices", midi::cmd_midi_devices);
    registry.register("midi connect", midi::cmd_midi_connect);
    registry.register("midi disconnect", midi::cmd_midi_disconnect);
    registry.register("midi status", midi::cmd_midi_status);

    // General
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use lockstep_core::{ClockConfig, ManualTimeSource};

    /// A context on a frozen clock with no outputs
    pub fn context() -> (CommandContext, ManualTimeSource) {
        let time = ManualTimeSource::new();
        let clock = ClockHandle::spawn(time.clone(), ClockConfig::default()).unwrap();
        (CommandContext::new(Arc::new(clock)), time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &str, _ctx: &mut CommandContext) -> CommandResult {
        CommandResult::Message(args.to_string())
    }

    fn other(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
        CommandResult::Success
    }

    #[test]
    fn test_longest_prefix_wins() {
        let (mut ctx, _time) = test_support::context();
        let mut registry = CommandRegistry::new();
        registry.register("midi", other);
        registry.register("midi connect", echo);

        assert_eq!(
            registry.execute("midi connect IAC Bus 1", &mut ctx),
            CommandResult::Message("IAC Bus 1".to_string())
        );
        assert_eq!(registry.execute("midi", &mut ctx), CommandResult::Success);
        assert_eq!(registry.execute("midiconnect", &mut ctx), CommandResult::NotACommand);
    }

    #[test]
    fn test_builtin_commands_are_registered() {
        let registry = create_registry();
        let commands = registry.list_commands();
        for name in ["start", "stop", "tempo", "add", "mult", "midi connect", "quit"] {
            assert!(commands.contains(&name), "missing {}", name);
        }
    }
}
