//! Timed MIDI output
//!
//! A dedicated thread owns the midir connection and a queue of messages
//! stamped with clock time. Each message goes out when the shared time
//! source reaches its stamp, so notes land on the times the clock scheduled
//! rather than when the poll happened to run.

use crate::audio::time::SharedTime;
use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use midir::{MidiOutput, MidiOutputConnection};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CLIENT_NAME: &str = "Lockstep";
/// Longest the thread sleeps with messages queued
const MAX_WAIT: Duration = Duration::from_millis(5);

/// MIDI Note On: 0x90 + channel, note, velocity
pub fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
}

/// MIDI Note Off: 0x80 + channel, note, velocity 0
pub fn note_off(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), note & 0x7F, 0]
}

/// All Notes Off: CC 123, value 0
pub fn all_notes_off(channel: u8) -> [u8; 3] {
    [0xB0 | (channel & 0x0F), 123, 0]
}

/// Commands that can be sent to the MIDI output thread
#[derive(Debug)]
enum MidiCommand {
    /// Open a port; the thread answers with the full port name
    Connect {
        port_name: String,
        reply: Sender<Result<String>>,
    },
    /// Send `bytes` once the time source reaches `at`
    Schedule { at: f64, bytes: [u8; 3] },
    /// Drop queued note-ons for a channel and silence it
    Silence { channel: u8 },
    Disconnect,
    Shutdown,
}

#[derive(Debug)]
struct TimedMessage {
    at: f64,
    seq: u64,
    bytes: [u8; 3],
}

impl PartialEq for TimedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedMessage {}

impl PartialOrd for TimedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior (earliest first)
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Messages waiting for their time, earliest first
#[derive(Default)]
struct MessageQueue {
    heap: BinaryHeap<TimedMessage>,
    seq: u64,
}

impl MessageQueue {
    fn push(&mut self, at: f64, bytes: [u8; 3]) {
        self.seq += 1;
        self.heap.push(TimedMessage {
            at,
            seq: self.seq,
            bytes,
        });
    }

    /// Pop every message due at `now`, in time order
    fn due(&mut self, now: f64) -> Vec<[u8; 3]> {
        let mut out = Vec::new();
        while self.heap.peek().is_some_and(|m| m.at <= now) {
            if let Some(m) = self.heap.pop() {
                out.push(m.bytes);
            }
        }
        out
    }

    /// Remove queued note-ons for `channel`; note-offs stay so nothing hangs
    fn drop_note_ons(&mut self, channel: u8) {
        let status = 0x90 | (channel & 0x0F);
        self.heap.retain(|m| m.bytes[0] != status);
    }

    fn next_at(&self) -> Option<f64> {
        self.heap.peek().map(|m| m.at)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

fn find_port(midi_out: &MidiOutput, port_name: &str) -> Result<midir::MidiOutputPort> {
    midi_out
        .ports()
        .into_iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .map(|name| name.contains(port_name))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))
}

/// Internal MIDI output handler that owns the connection
struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
    time: SharedTime,
    queue: MessageQueue,
}

impl MidiOutputInternal {
    fn new(command_rx: Receiver<MidiCommand>, time: SharedTime) -> Self {
        Self {
            connection: None,
            command_rx,
            time,
            queue: MessageQueue::default(),
        }
    }

    /// On failure the current connection, if any, stays open
    fn connect(&mut self, port_name: &str) -> Result<String> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let port = find_port(&midi_out, port_name)?;
        let actual_name = midi_out.port_name(&port)?;
        let connection = midi_out
            .connect(&port, "lockstep-out")
            .map_err(|e| anyhow!("Failed to connect: {}", e))?;
        self.connection = Some(connection);
        info!("Connected MIDI output '{}'", actual_name);
        Ok(actual_name)
    }

    fn send(&mut self, bytes: &[u8]) {
        if let Some(conn) = &mut self.connection {
            if let Err(e) = conn.send(bytes) {
                warn!("MIDI send failed: {}", e);
            }
        }
    }

    fn flush_due(&mut self) {
        let now = self.time.now();
        for bytes in self.queue.due(now) {
            self.send(&bytes);
        }
    }

    fn wait(&self) -> Option<Duration> {
        let at = self.queue.next_at()?;
        let delta = (at - self.time.now()).max(0.0);
        Some(Duration::from_secs_f64(delta).min(MAX_WAIT))
    }

    /// Returns `true` on shutdown
    fn handle(&mut self, cmd: MidiCommand) -> bool {
        match cmd {
            MidiCommand::Connect { port_name, reply } => {
                let result = self.connect(&port_name);
                if let Err(e) = &result {
                    warn!("MIDI connect error: {}", e);
                }
                let _ = reply.send(result);
            }
            MidiCommand::Schedule { at, bytes } => self.queue.push(at, bytes),
            MidiCommand::Silence { channel } => {
                self.queue.drop_note_ons(channel);
                self.send(&all_notes_off(channel));
            }
            MidiCommand::Disconnect => {
                self.connection = None;
                debug!("Disconnected MIDI output");
            }
            MidiCommand::Shutdown => {
                for ch in 0..16u8 {
                    self.send(&all_notes_off(ch));
                }
                return true;
            }
        }
        false
    }

    fn run(&mut self) {
        loop {
            self.flush_due();
            // Block when nothing is queued, otherwise sleep until the next message
            let cmd = match self.wait() {
                None => match self.command_rx.recv() {
                    Ok(cmd) => cmd,
                    Err(_) => break,
                },
                Some(timeout) => match self.command_rx.recv_timeout(timeout) {
                    Ok(cmd) => cmd,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };
            if self.handle(cmd) {
                break;
            }
        }
    }
}

/// Thread-safe handle to the MIDI output
pub struct MidiOutputHandle {
    command_tx: Sender<MidiCommand>,
    thread: Option<JoinHandle<()>>,
    /// Name of the connected port
    port_name: RwLock<Option<String>>,
}

impl MidiOutputHandle {
    /// Create a handle (not connected to any port yet) whose timestamps are
    /// read against `time`
    pub fn new(time: SharedTime) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("lockstep-midi".to_string())
            .spawn(move || MidiOutputInternal::new(rx, time).run())
            .map_err(|e| anyhow!("Failed to spawn MIDI thread: {}", e))?;

        Ok(Self {
            command_tx: tx,
            thread: Some(thread),
            port_name: RwLock::new(None),
        })
    }

    /// List available MIDI output ports
    ///
    /// Creating a MIDI client occasionally fails on macOS, so this retries
    /// up to 3 times with a small delay.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                thread::sleep(Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    return Ok(midi_out
                        .ports()
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    /// Connect to an output port by name (partial match supported)
    ///
    /// Returns once the output thread holds the connection. A failed
    /// attempt leaves the previous connection in place.
    pub fn connect(&self, port_name: &str) -> Result<String> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.send(MidiCommand::Connect {
            port_name: port_name.to_string(),
            reply,
        })?;
        let actual_name = response
            .recv()
            .map_err(|e| anyhow!("MIDI thread is gone: {}", e))??;
        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = Some(actual_name.clone());
        Ok(actual_name)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(MidiCommand::Disconnect)?;
        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected_port().is_some()
    }

    pub fn connected_port(&self) -> Option<String> {
        self.port_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a note of `length` seconds starting at clock time `at`
    pub fn schedule_note(
        &self,
        at: f64,
        length: f64,
        channel: u8,
        note: u8,
        velocity: u8,
    ) -> Result<()> {
        self.send(MidiCommand::Schedule {
            at,
            bytes: note_on(channel, note, velocity),
        })?;
        self.send(MidiCommand::Schedule {
            at: at + length.max(0.0),
            bytes: note_off(channel, note),
        })
    }

    /// Cancel queued notes on `channel` and send All Notes Off
    pub fn silence(&self, channel: u8) -> Result<()> {
        self.send(MidiCommand::Silence { channel })
    }

    fn send(&self, cmd: MidiCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| anyhow!("MIDI thread is gone: {}", e))
    }
}

impl Drop for MidiOutputHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
