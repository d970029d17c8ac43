//! Speaker output on a sample-counted timeline (CPAL).
//!
//! The device callback mixes every scheduled buffer whose window overlaps the
//! block being rendered and advances a frame counter. That counter is the
//! output clock: `now()` is the number of frames handed to the device divided
//! by the stream rate.

use crate::audio::device::{Direction, open_device};
use crate::audio::frame::AudioFrame;
use crate::audio::resample::{expand_channels, mix_to_mono, resample_to_len};
use crate::error::{LivelingoError, Result};
use crate::playback::clock::{HandleId, OutputClock, PlaybackError};
use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// SAFETY: The stream is only touched from the owning `CpalOutput`, which the
/// session drives from a single task.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

struct Voice {
    id: HandleId,
    start_frame: u64,
    /// Interleaved at the stream's channel count.
    samples: Vec<f32>,
}

impl Voice {
    fn frame_len(&self, channels: usize) -> u64 {
        (self.samples.len() / channels.max(1)) as u64
    }
}

#[derive(Default)]
struct Timeline {
    position: u64,
    voices: Vec<Voice>,
    completed: Vec<HandleId>,
}

impl Timeline {
    /// Mix one block of interleaved output and advance the position.
    fn render(&mut self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        let frames = (out.len() / channels) as u64;
        let block_start = self.position;
        let block_end = block_start + frames;

        for voice in &self.voices {
            let voice_end = voice.start_frame + voice.frame_len(channels);
            if voice_end <= block_start || voice.start_frame >= block_end {
                continue;
            }
            let from = voice.start_frame.max(block_start);
            let to = voice_end.min(block_end);
            for frame in from..to {
                let out_base = ((frame - block_start) as usize) * channels;
                let src_base = ((frame - voice.start_frame) as usize) * channels;
                for ch in 0..channels {
                    out[out_base + ch] += voice.samples[src_base + ch];
                }
            }
        }
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.position = block_end;
        let position = self.position;
        let completed = &mut self.completed;
        self.voices.retain(|voice| {
            let done = voice.start_frame + voice.frame_len(channels) <= position;
            if done {
                completed.push(voice.id);
            }
            !done
        });
    }
}

fn frames_at(at: Duration, rate: u32) -> u64 {
    let nanos = at.as_nanos() * u128::from(rate);
    ((nanos + 500_000_000) / 1_000_000_000) as u64
}

/// Inverse of `frames_at`, rounded down to the nanosecond.
fn duration_at(frames: u64, rate: u32) -> Duration {
    let nanos = u128::from(frames) * 1_000_000_000 / u128::from(rate.max(1));
    Duration::from_nanos(nanos as u64)
}

/// Where a buffer of `duration` requested at `at` lands on the timeline.
///
/// Returns the first frame, the frame after the last and the actual start
/// instant. A request behind `position` starts at `position`. The end is
/// taken from the same rounding as the next buffer's start, so buffers
/// chained from the returned instant neither overlap nor leave a gap.
fn placement(at: Duration, duration: Duration, rate: u32, position: u64) -> (u64, u64, Duration) {
    let requested = frames_at(at, rate);
    let (start, actual) = if requested >= position {
        (requested, at)
    } else {
        (position, duration_at(position, rate))
    };
    let end = frames_at(actual + duration, rate).max(start);
    (start, end, actual)
}

/// Speaker output implementing [`OutputClock`].
pub struct CpalOutput {
    stream: Option<SendableStream>,
    timeline: Arc<Mutex<Timeline>>,
    rate: u32,
    channels: usize,
}

impl CpalOutput {
    /// Open the named output device, or the best default one.
    ///
    /// Prefers a stream at `sample_rate`; otherwise uses the device's native
    /// config and converts buffers as they are scheduled.
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = open_device(Direction::Output, device_name)?;
        let default_config =
            device
                .default_output_config()
                .map_err(|e| LivelingoError::AudioPlayback {
                    message: format!("Failed to query default output config: {}", e),
                })?;
        let channels = default_config.channels().max(1);

        let timeline = Arc::new(Mutex::new(Timeline::default()));

        let preferred = cpal::StreamConfig {
            channels,
            sample_rate: sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let (stream, rate) = match build_stream(&device, &preferred, Arc::clone(&timeline)) {
            Ok(stream) => (stream, sample_rate),
            Err(e) => {
                let native: cpal::StreamConfig = default_config.into();
                log::info!(
                    "output rejected {}Hz ({}), using native {}ch/{}Hz",
                    sample_rate,
                    e,
                    native.channels,
                    native.sample_rate
                );
                let rate = native.sample_rate;
                (build_stream(&device, &native, Arc::clone(&timeline))?, rate)
            }
        };

        stream.play().map_err(|e| LivelingoError::AudioPlayback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        Ok(Self {
            stream: Some(SendableStream(stream)),
            timeline,
            rate,
            channels: usize::from(channels),
        })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Timeline>, PlaybackError> {
        self.timeline.lock().map_err(|e| PlaybackError::Device {
            message: format!("Failed to lock output timeline: {}", e),
        })
    }

}

/// Convert a decoded frame to `rate` and `channels`, exactly `frames` long.
fn prepare(frame: &AudioFrame, rate: u32, channels: usize, frames: usize) -> Vec<f32> {
    let mono = mix_to_mono(frame.samples(), usize::from(frame.channels()));
    let mono = resample_to_len(&mono, frame.sample_rate(), rate, frames);
    expand_channels(&mono, channels)
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    timeline: Arc<Mutex<Timeline>>,
) -> Result<cpal::Stream> {
    let channels = usize::from(config.channels.max(1));
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match timeline.lock() {
                Ok(mut timeline) => timeline.render(data, channels),
                Err(_) => data.fill(0.0),
            },
            |err| log::warn!("audio output stream error: {}", err),
            None,
        )
        .map_err(|e| LivelingoError::AudioPlayback {
            message: format!("Failed to build output stream: {}", e),
        })
}

impl OutputClock for CpalOutput {
    fn now(&self) -> Duration {
        match self.timeline.lock() {
            Ok(timeline) => duration_at(timeline.position, self.rate),
            Err(_) => Duration::ZERO,
        }
    }

    fn start(
        &mut self,
        id: HandleId,
        frame: &AudioFrame,
        at: Duration,
    ) -> std::result::Result<Duration, PlaybackError> {
        if self.stream.is_none() {
            return Err(PlaybackError::Released);
        }
        let (rate, channels) = (self.rate, self.channels);
        let mut timeline = self.lock()?;
        // The callback may have moved past `at` since the scheduler read the
        // clock; never place a buffer behind the render position.
        let (start_frame, end_frame, actual) =
            placement(at, frame.duration(), rate, timeline.position);
        let samples = prepare(frame, rate, channels, (end_frame - start_frame) as usize);
        timeline.voices.push(Voice {
            id,
            start_frame,
            samples,
        });
        Ok(actual)
    }

    fn stop(&mut self, id: HandleId) -> std::result::Result<(), PlaybackError> {
        let mut timeline = self.lock()?;
        match timeline.voices.iter().position(|v| v.id == id) {
            Some(index) => {
                timeline.voices.remove(index);
                Ok(())
            }
            None => Err(PlaybackError::NotPlaying { id }),
        }
    }

    fn take_completed(&mut self) -> Vec<HandleId> {
        match self.timeline.lock() {
            Ok(mut timeline) => std::mem::take(&mut timeline.completed),
            Err(_) => Vec::new(),
        }
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.0.pause()
        {
            log::debug!("output stream pause failed: {}", e);
        }
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.voices.clear();
            timeline.completed.clear();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.release();
    }
}
