//! Device commands: add and remove voices, per-device transport and tempo

use crate::audio::voice::{Output, Pattern, Voice};
use crate::commands::transport::{MAX_BPM, MIN_BPM};
use crate::commands::{CommandContext, CommandResult};
use colored::*;
use lockstep_core::types::tempo::{parse_multiplier, MAX_MULTIPLIER};
use lockstep_core::{DeviceSpec, TempoMode};

/// General MIDI drum channel (channel 10)
const DRUM_CHANNEL: u8 = 9;
/// Bass drum; later voices move up the drum map
const FIRST_DRUM_NOTE: u8 = 36;

/// Split `args` into the device id and the rest, checking the id exists
fn known_device<'a>(
    args: &'a str,
    ctx: &CommandContext,
    usage: &str,
) -> Result<(&'a str, &'a str), CommandResult> {
    let (id, rest) = args.split_once(' ').unwrap_or((args, ""));
    if id.is_empty() {
        return Err(CommandResult::Error(format!("Usage: {}", usage)));
    }
    if ctx.clock.device(id).is_none() {
        return Err(CommandResult::Error(format!("Unknown device '{}'", id)));
    }
    Ok((id, rest.trim()))
}

/// Pick an output for the next voice: MIDI when a port is connected, else
/// the click stream, else silence
fn next_output(ctx: &CommandContext) -> Output {
    let index = ctx.clock.device_ids().len();
    if let Some(handle) = ctx.midi_handle.as_ref().filter(|h| h.is_connected()) {
        return Output::Midi {
            handle: handle.clone(),
            channel: DRUM_CHANNEL,
            note: FIRST_DRUM_NOTE.saturating_add((index as u8).saturating_mul(2)),
        };
    }
    match &ctx.click {
        Some(sender) => Output::Click {
            sender: sender.clone(),
            frequency: 440.0 * (1.0 + index as f32 * 0.25),
        },
        None => Output::Silent,
    }
}

/// Handle `add <id> [steps] [pattern]` command
pub fn cmd_add(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let Some((&id, rest)) = parts.split_first() else {
        return CommandResult::Error(
            "Usage: add <id> [steps] [pattern]\n  e.g. add kick 16 x...x...x...x..."
                .to_string(),
        );
    };

    let (steps, pattern) = match rest {
        [] => (None, None),
        [one] => match one.parse::<usize>() {
            Ok(steps) => (Some(steps), None),
            Err(_) => (None, Some(*one)),
        },
        [steps, pattern, ..] => match steps.parse::<usize>() {
            Ok(steps) => (Some(steps), Some(*pattern)),
            Err(_) => return CommandResult::Error(format!("Invalid step count '{}'", steps)),
        },
    };

    let pattern = match pattern.map(Pattern::parse) {
        Some(Ok(p)) => p,
        Some(Err(e)) => return CommandResult::Error(e),
        None => Pattern::four_on_the_floor(steps.unwrap_or(16)),
    };
    let steps = steps.unwrap_or(pattern.len());

    let output = next_output(ctx);
    let output_name = output.name();
    let voice = Voice::new(pattern.clone(), output);
    let playhead = voice.playhead();

    match ctx
        .clock
        .register(DeviceSpec::new(id).with_step_count(steps), voice)
    {
        Ok(handle) => {
            ctx.playheads.insert(handle.id().to_string(), playhead);
            CommandResult::Message(format!(
                "➕ Added {} ({} steps, {}, {}) - paused until {} or {}",
                handle.id().cyan(),
                steps,
                pattern,
                output_name,
                "start".green(),
                format!("resume {}", handle.id()).green()
            ))
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `remove <id>` command
pub fn cmd_remove(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, _) = match known_device(args, ctx, "remove <id>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    ctx.clock.unregister(id);
    ctx.playheads.remove(id);
    CommandResult::Message(format!("➖ Removed {}", id.cyan()))
}

/// Handle `pause <id>` command
pub fn cmd_pause(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, _) = match known_device(args, ctx, "pause <id>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    ctx.clock.pause_device(id);
    CommandResult::Message(format!("⏸ Paused {}", id.cyan()))
}

/// Handle `resume <id>` command
pub fn cmd_resume(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, _) = match known_device(args, ctx, "resume <id>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    if ctx.clock.resume_device(id) {
        CommandResult::Message(format!("▶ Resumed {} and started the clock", id.cyan()))
    } else {
        CommandResult::Message(format!("▶ Resumed {}", id.cyan()))
    }
}

/// Handle `mode <id> sync|free` command
pub fn cmd_mode(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, rest) = match known_device(args, ctx, "mode <id> sync|free") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    match TempoMode::from_str(rest) {
        Some(mode) => {
            ctx.clock.set_mode(id, mode);
            CommandResult::Message(format!("{} is now {}", id.cyan(), mode.name().green()))
        }
        None => CommandResult::Error("Usage: mode <id> sync|free".to_string()),
    }
}

/// Handle `mult <id> <n/d>` command
pub fn cmd_mult(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, rest) = match known_device(args, ctx, "mult <id> <n/d>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    match parse_multiplier(rest) {
        Some(multiplier) => {
            ctx.clock.set_multiplier(id, multiplier);
            CommandResult::Message(format!(
                "{} runs at {}× the master tempo",
                id.cyan(),
                multiplier.to_string().green()
            ))
        }
        None => CommandResult::Error(format!(
            "Multiplier must lie between 1/{0} and {0}, e.g. 2, 1/2 or 0.75",
            MAX_MULTIPLIER
        )),
    }
}

/// Handle `free <id> <bpm>` command
pub fn cmd_free(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, rest) = match known_device(args, ctx, "free <id> <bpm>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    match rest.parse::<f64>() {
        Ok(bpm) if (MIN_BPM..=MAX_BPM).contains(&bpm) => {
            ctx.clock.set_free_bpm(id, bpm);
            let note = if ctx.clock.device(id).map(|d| d.mode) == Some(TempoMode::Free) {
                String::new()
            } else {
                format!(" (applies once {})", format!("mode {} free", id).green())
            };
            CommandResult::Message(format!(
                "{} free tempo set to {:.1} BPM{}",
                id.cyan(),
                bpm,
                note
            ))
        }
        _ => CommandResult::Error(format!(
            "Invalid tempo. Use a value between {}-{} BPM",
            MIN_BPM, MAX_BPM
        )),
    }
}

/// Handle `reset <id>` command
pub fn cmd_reset(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, _) = match known_device(args, ctx, "reset <id>") {
        Ok(parsed) => parsed,
        Err(result) => return result,
    };
    ctx.clock.reset_step(id);
    CommandResult::Message(format!("↺ {} back to step 1", id.cyan()))
}

/// Handle `devices` command
pub fn cmd_devices(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let devices = ctx.clock.devices();
    if devices.is_empty() {
        return CommandResult::Message(format!(
            "No devices. Use {}",
            "add <id> [steps] [pattern]".green()
        ));
    }

    let mut output = format!("{}\n", "🎛️  Devices:".bold());
    for device in devices {
        let state = if device.paused {
            "paused".yellow()
        } else {
            "active".green()
        };
        let tempo = match device.mode {
            TempoMode::Sync => {
                let (n, d) = device.multiplier;
                if d == 1 {
                    format!("sync ×{}", n)
                } else {
                    format!("sync ×{}/{}", n, d)
                }
            }
            TempoMode::Free => format!("free {:.1} BPM", device.free_bpm),
        };
        let playhead = ctx
            .playheads
            .get(&device.id)
            .and_then(|p| p.get())
            .map(|step| render_playhead(step, device.step_count))
            .unwrap_or_default();
        output.push_str(&format!(
            "  {:<10} {:<8} {:<16} {} steps {}\n",
            device.id.cyan(),
            state,
            tempo,
            device.step_count,
            playhead
        ));
    }
    CommandResult::Message(output)
}

/// `step` of `count` as a row of dots with a marker
fn render_playhead(step: usize, count: usize) -> String {
    (0..count)
        .map(|i| if i == step { '●' } else { '·' })
        .collect()
}
