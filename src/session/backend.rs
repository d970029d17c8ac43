//! Audio device acquisition for a session.

use crate::audio::recorder::{CaptureSource, MockCaptureSource};
use crate::config::AudioConfig;
use crate::error::{LivelingoError, Result};
use crate::playback::clock::{ManualClock, OutputClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Opens the capture and output devices each session needs.
pub trait AudioBackend: Send + Sync {
    fn open_capture(&self, config: &AudioConfig) -> Result<Box<dyn CaptureSource>>;
    fn open_output(&self, config: &AudioConfig) -> Result<Box<dyn OutputClock>>;
}

/// Real microphone and speaker through CPAL.
#[cfg(feature = "cpal-audio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

#[cfg(feature = "cpal-audio")]
impl AudioBackend for CpalBackend {
    fn open_capture(&self, config: &AudioConfig) -> Result<Box<dyn CaptureSource>> {
        let capture = crate::audio::capture::CpalCapture::new(
            config.input_device.as_deref(),
            config.capture_sample_rate,
        )?;
        Ok(Box::new(capture))
    }

    fn open_output(&self, config: &AudioConfig) -> Result<Box<dyn OutputClock>> {
        let output = crate::playback::device::CpalOutput::new(
            config.output_device.as_deref(),
            config.playback_sample_rate,
        )?;
        Ok(Box::new(output))
    }
}

/// In-memory devices: a scripted microphone and a manual output clock.
///
/// Every session gets a clone of the same mock source and clock, so a test
/// keeps full visibility after the controller takes ownership.
#[derive(Debug, Clone)]
pub struct MockAudioBackend {
    capture: MockCaptureSource,
    clock: ManualClock,
    fail_capture: bool,
    fail_output: bool,
    capture_opens: Arc<AtomicUsize>,
    output_opens: Arc<AtomicUsize>,
}

impl MockAudioBackend {
    pub fn new(capture: MockCaptureSource, clock: ManualClock) -> Self {
        Self {
            capture,
            clock,
            fail_capture: false,
            fail_output: false,
            capture_opens: Arc::new(AtomicUsize::new(0)),
            output_opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make opening the microphone fail as if it were unplugged.
    pub fn with_capture_failure(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// Make opening the speaker fail.
    pub fn with_output_failure(mut self) -> Self {
        self.fail_output = true;
        self
    }

    pub fn capture(&self) -> &MockCaptureSource {
        &self.capture
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of successful microphone acquisitions.
    pub fn capture_opens(&self) -> usize {
        self.capture_opens.load(Ordering::SeqCst)
    }

    /// Number of successful speaker acquisitions.
    pub fn output_opens(&self) -> usize {
        self.output_opens.load(Ordering::SeqCst)
    }
}

impl AudioBackend for MockAudioBackend {
    fn open_capture(&self, _config: &AudioConfig) -> Result<Box<dyn CaptureSource>> {
        if self.fail_capture {
            return Err(LivelingoError::AudioDeviceNotFound {
                device: "mock microphone".to_string(),
            });
        }
        self.capture_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.capture.clone()))
    }

    fn open_output(&self, _config: &AudioConfig) -> Result<Box<dyn OutputClock>> {
        if self.fail_output {
            return Err(LivelingoError::AudioPlayback {
                message: "mock speaker unavailable".to_string(),
            });
        }
        self.output_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clock.clone()))
    }
}
