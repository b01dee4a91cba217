//! Sample-accurate click renderer
//!
//! [`ClickEngine`] owns a cpal output stream. Its frame counter doubles as
//! the clock's time source, and clicks queued through a [`ClickSender`] start
//! on the exact frame that matches their scheduled time.

use crate::audio::time::AudioTimeSource;
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{error, info};

/// Length of one click
const CLICK_SECS: f32 = 0.03;
/// Decay rate of the click envelope (per second)
const DECAY: f32 = 120.0;
const MASTER_GAIN: f32 = 0.3;

/// A click queued for a given frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub frame: u64,
    pub frequency: f32,
    pub gain: f32,
}

/// Queues clicks for the audio thread; cheap to clone
#[derive(Clone)]
pub struct ClickSender {
    tx: Sender<Click>,
    timing: AudioTimeSource,
}

impl ClickSender {
    /// Create a sender and the receiving end the renderer drains
    pub fn channel(timing: AudioTimeSource) -> (Self, Receiver<Click>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, timing }, rx)
    }

    /// Play a click at `time` seconds on the stream's clock
    pub fn schedule(&self, time: f64, frequency: f32, gain: f32) {
        let click = Click {
            frame: self.timing.frame_at(time),
            frequency,
            gain,
        };
        // The renderer is gone only at shutdown
        let _ = self.tx.send(click);
    }
}

#[derive(Debug)]
struct Voice {
    frequency: f32,
    gain: f32,
    /// Frames played so far
    age: u32,
}

/// Mixes queued clicks into sample frames
///
/// Kept apart from the cpal stream so it can run without an audio device.
pub struct ClickRenderer {
    sample_rate: f32,
    length: u32,
    pending: Vec<Click>,
    voices: Vec<Voice>,
}

impl ClickRenderer {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            sample_rate,
            length: (CLICK_SECS * sample_rate) as u32,
            pending: Vec::new(),
            voices: Vec::new(),
        }
    }

    pub fn queue(&mut self, click: Click) {
        self.pending.push(click);
    }

    /// Number of clicks waiting for their frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Render the sample at `frame`. Clicks whose frame has passed start now.
    pub fn next_sample(&mut self, frame: u64) -> f32 {
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].frame <= frame {
                let click = self.pending.swap_remove(i);
                self.voices.push(Voice {
                    frequency: click.frequency,
                    gain: click.gain,
                    age: 0,
                });
            } else {
                i += 1;
            }
        }

        let mut value = 0.0;
        for voice in &mut self.voices {
            let t = voice.age as f32 / self.sample_rate;
            let envelope = (-DECAY * t).exp();
            value += voice.gain * envelope * (2.0 * std::f32::consts::PI * voice.frequency * t).sin();
            voice.age += 1;
        }
        let length = self.length;
        self.voices.retain(|v| v.age < length);
        (value * MASTER_GAIN).clamp(-1.0, 1.0)
    }
}

/// Audio output that renders clicks and drives the clock's time
pub struct ClickEngine {
    stream: Stream,
    timing: AudioTimeSource,
    sender: ClickSender,
}

impl ClickEngine {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_format = config.sample_format();
        let config: StreamConfig = config.into();
        let timing = AudioTimeSource::new(config.sample_rate.0);
        let (sender, rx) = ClickSender::channel(timing.clone());

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, timing.clone(), rx)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, timing.clone(), rx)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, timing.clone(), rx)?,
            _ => return Err(anyhow!("Unsupported sample format: {:?}", sample_format)),
        };
        info!(
            "Opened audio output at {} Hz, {} channels",
            config.sample_rate.0, config.channels
        );

        Ok(Self {
            stream,
            timing,
            sender,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        timing: AudioTimeSource,
        rx: Receiver<Click>,
    ) -> Result<Stream>
    where
        T: Sample + SizedSample + Send + 'static + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut renderer = ClickRenderer::new(config.sample_rate.0);

        let err_fn = |err| error!("Audio output stream error: {:?}", err);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for click in rx.try_iter() {
                        renderer.queue(click);
                    }
                    let start = timing.current_frame();
                    let mut frames = 0;
                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        let value: T = T::from_sample(renderer.next_sample(start + i as u64));
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                        frames += 1;
                    }
                    timing.advance(frames);
                },
                err_fn,
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {}", e))?;

        Ok(stream)
    }

    /// The stream's clock
    pub fn time_source(&self) -> AudioTimeSource {
        self.timing.clone()
    }

    pub fn sender(&self) -> ClickSender {
        self.sender.clone()
    }

    pub fn play(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| anyhow!("Failed to play stream: {}", e))
    }

    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| anyhow!("Failed to pause stream: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_engine_creation() {
        // May fail on systems without audio devices (like CI)
        match ClickEngine::new() {
            Ok(engine) => assert_eq!(engine.time_source().current_frame(), 0),
            Err(e) => println!("No audio device available: {}", e),
        }
    }

    #[test]
    fn test_sender_converts_time_to_frames() {
        let timing = AudioTimeSource::new(48_000);
        let (sender, rx) = ClickSender::channel(timing);
        sender.schedule(0.5, 1000.0, 1.0);
        let click = rx.try_recv().unwrap();
        assert_eq!(click.frame, 24_000);
        assert_eq!(click.frequency, 1000.0);
    }

    #[test]
    fn test_click_starts_on_its_frame() {
        let mut renderer = ClickRenderer::new(48_000);
        renderer.queue(Click {
            frame: 100,
            frequency: 1000.0,
            gain: 1.0,
        });

        for frame in 0..100 {
            assert_eq!(renderer.next_sample(frame), 0.0);
        }
        assert_eq!(renderer.pending(), 1);
        assert_eq!(renderer.next_sample(100), 0.0);
        assert_eq!(renderer.pending(), 0);
        // Sine starts at zero, then rises
        assert!(renderer.next_sample(101) > 0.0);
    }

    #[test]
    fn test_late_click_plays_immediately() {
        let mut renderer = ClickRenderer::new(48_000);
        renderer.queue(Click {
            frame: 10,
            frequency: 500.0,
            gain: 1.0,
        });
        renderer.next_sample(500);
        assert_eq!(renderer.pending(), 0);
        assert!(renderer.next_sample(501) != 0.0);
    }

    #[test]
    fn test_click_dies_out() {
        let mut renderer = ClickRenderer::new(1_000);
        renderer.queue(Click {
            frame: 0,
            frequency: 100.0,
            gain: 1.0,
        });
        // 30 ms at 1 kHz is 30 frames
        for frame in 0..30 {
            let v = renderer.next_sample(frame);
            assert!((-1.0..=1.0).contains(&v));
        }
        assert_eq!(renderer.next_sample(30), 0.0);
    }
}
