//! MIDI REPL commands

use crate::audio::midi::MidiOutputHandle;
use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `midi devices` command - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiOutputHandle::list_ports() {
        Ok(ports) if ports.is_empty() => CommandResult::Message(
            "No MIDI output ports found. Make sure a MIDI device or virtual port is connected."
                .yellow()
                .to_string(),
        ),
        Ok(ports) => {
            let mut output = format!("{}\n", "🎹 Available MIDI Output Ports:".bold());
            for (i, port) in ports.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
            }
            output.push_str(&format!(
                "\n{} {}",
                "Use".dimmed(),
                "midi connect <port name>".green()
            ));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `midi connect <port>` command
///
/// Voices added afterwards play on the drum channel; existing voices keep
/// their output.
pub fn cmd_midi_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi connect <port name>\nUse 'midi devices' to see available ports"
                .to_string(),
        );
    }

    match &ctx.midi_handle {
        Some(handle) => match handle.connect(args) {
            Ok(name) => {
                CommandResult::Message(format!("🎹 Connected to MIDI port: {}", name.green()))
            }
            Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {}", args, e)),
        },
        None => CommandResult::Error("MIDI output not initialized".to_string()),
    }
}

/// Handle `midi disconnect` command
pub fn cmd_midi_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match &ctx.midi_handle {
        Some(handle) => match handle.disconnect() {
            Ok(()) => CommandResult::Message("🎹 Disconnected from MIDI".to_string()),
            Err(e) => CommandResult::Error(format!("Failed to disconnect: {}", e)),
        },
        None => CommandResult::Error("MIDI output not initialized".to_string()),
    }
}

/// Handle `midi status` command
pub fn cmd_midi_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match &ctx.midi_handle {
        Some(handle) => {
            let mut output = format!("{}\n", "🎹 MIDI Status:".bold());
            match handle.connected_port() {
                Some(name) => {
                    output.push_str(&format!("  Status: {}\n", "Connected".green().bold()));
                    output.push_str(&format!("  Port: {}\n", name.cyan()));
                }
                None => output.push_str(&format!("  Status: {}\n", "Not connected".yellow())),
            }
            CommandResult::Message(output)
        }
        None => CommandResult::Error("MIDI output not initialized".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use std::sync::Arc;

    #[test]
    fn test_commands_without_midi() {
        let (mut ctx, _time) = context();
        assert!(matches!(
            cmd_midi_connect("IAC", &mut ctx),
            CommandResult::Error(_)
        ));
        assert!(matches!(
            cmd_midi_status("", &mut ctx),
            CommandResult::Error(_)
        ));
        assert!(matches!(
            cmd_midi_connect("", &mut ctx),
            CommandResult::Error(_)
        ));
    }

    #[test]
    fn test_status_when_not_connected() {
        let (ctx, time) = context();
        let handle = MidiOutputHandle::new(Arc::new(time)).unwrap();
        let mut ctx = ctx.with_midi(Arc::new(handle));
        match cmd_midi_status("", &mut ctx) {
            CommandResult::Message(msg) => assert!(msg.contains("Not connected")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            cmd_midi_disconnect("", &mut ctx),
            CommandResult::Message(_)
        ));
    }
}
