//! Transport commands (start, stop, tempo, status)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Tempo range accepted from the prompt
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Handle `start` command
pub fn cmd_start(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.clock.start() {
        CommandResult::Message(
            format!("▶ Started at {:.1} BPM", ctx.clock.master_bpm())
                .bright_green()
                .to_string(),
        )
    } else {
        CommandResult::Message("Already running".yellow().to_string())
    }
}

/// Handle `stop` command
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.clock.stop() {
        CommandResult::Message("■ Stopped".bright_red().to_string())
    } else {
        CommandResult::Message("Not running".yellow().to_string())
    }
}

/// Handle `tempo [bpm]` command
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!(
            "Current tempo: {:.1} BPM",
            ctx.clock.master_bpm()
        ));
    }

    match args.parse::<f64>() {
        Ok(bpm) if (MIN_BPM..=MAX_BPM).contains(&bpm) => {
            ctx.clock.set_master_bpm(bpm);
            CommandResult::Message(
                format!("🎵 Tempo set to {:.1} BPM", bpm)
                    .bright_green()
                    .to_string(),
            )
        }
        _ => CommandResult::Error(format!(
            "Invalid tempo. Use a value between {}-{} BPM",
            MIN_BPM, MAX_BPM
        )),
    }
}

/// Handle `status` command
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let state = if ctx.clock.is_running() {
        "running".green().bold()
    } else {
        "stopped".yellow()
    };
    let config = ctx.clock.config();
    CommandResult::Message(format!(
        "Transport: {}\n  Tempo: {:.1} BPM\n  Devices: {}\n  Lookahead: {:.0} ms every {} ms\n  Time: {:.3}s",
        state,
        ctx.clock.master_bpm(),
        ctx.clock.device_ids().len(),
        config.schedule_ahead_secs * 1000.0,
        config.poll_interval_ms,
        ctx.clock.now()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    #[test]
    fn test_start_and_stop() {
        let (mut ctx, _time) = context();
        assert!(matches!(cmd_start("", &mut ctx), CommandResult::Message(_)));
        assert!(ctx.clock.is_running());
        cmd_start("", &mut ctx);
        assert!(ctx.clock.is_running());

        cmd_stop("", &mut ctx);
        assert!(!ctx.clock.is_running());
    }

    #[test]
    fn test_tempo_range() {
        let (mut ctx, _time) = context();
        assert!(matches!(cmd_tempo("140", &mut ctx), CommandResult::Message(_)));
        assert_eq!(ctx.clock.master_bpm(), 140.0);

        for bad in ["19.9", "301", "fast", "-5", "NaN"] {
            assert!(matches!(cmd_tempo(bad, &mut ctx), CommandResult::Error(_)));
        }
        assert_eq!(ctx.clock.master_bpm(), 140.0);

        match cmd_tempo("", &mut ctx) {
            CommandResult::Message(msg) => assert!(msg.contains("140.0")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_mentions_tempo() {
        let (mut ctx, _time) = context();
        match cmd_status("", &mut ctx) {
            CommandResult::Message(msg) => assert!(msg.contains("120.0 BPM")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
