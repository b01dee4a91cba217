//! General REPL commands (help, quit)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Message(help_text())
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

fn help_text() -> String {
    let sections: [(&str, &[(&str, &str)]); 4] = [
        (
            "Transport:",
            &[
                ("start", "Start every device from step 1"),
                ("stop", "Stop the clock"),
                ("tempo [bpm]", "Show or set the master tempo (20-300)"),
                ("status", "Show the clock state"),
            ],
        ),
        (
            "Devices:",
            &[
                ("add <id> [steps] [pattern]", "Add a voice, e.g. add hat 8 x.x.x.xx"),
                ("remove <id>", "Remove a voice"),
                ("pause <id>", "Silence one voice"),
                ("resume <id>", "Restart one voice (starts the clock if needed)"),
                ("mode <id> sync|free", "Follow the master tempo or run free"),
                ("mult <id> <n/d>", "Speed relative to the master, e.g. 2 or 1/2"),
                ("free <id> <bpm>", "Tempo used in free mode"),
                ("reset <id>", "Jump back to step 1 without losing time"),
                ("devices", "List voices with their playheads"),
            ],
        ),
        (
            "MIDI:",
            &[
                ("midi devices", "List output ports"),
                ("midi connect <port>", "Send new voices to a port"),
                ("midi disconnect", "Close the port"),
                ("midi status", "Show the connection"),
            ],
        ),
        (
            "General:",
            &[("help", "Show this help"), ("quit", "Exit (or Ctrl+D)")],
        ),
    ];

    let mut out = format!("{}\n{}\n", "🎵 Lockstep Help".bold(), "================".bold());
    for (title, commands) in sections {
        out.push_str(&format!("\n{}\n", title.green()));
        for (usage, description) in commands {
            out.push_str(&format!("  {:<28} - {}\n", usage.cyan(), description));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    #[test]
    fn test_quit() {
        let (mut ctx, _time) = context();
        assert_eq!(cmd_quit("", &mut ctx), CommandResult::Exit);
    }

    #[test]
    fn test_help_lists_commands() {
        let text = help_text();
        for name in ["start", "tempo", "mult", "midi connect", "quit"] {
            assert!(text.contains(name), "help is missing {}", name);
        }
    }
}
