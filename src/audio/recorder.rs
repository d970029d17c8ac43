use crate::error::{LivelingoError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for capture devices.
///
/// This trait allows swapping implementations (real microphone vs mock).
/// Implementations only buffer samples in their device callback; the capture
/// pump drains them with `read_samples`.
pub trait CaptureSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Drain the samples captured since the last call.
    ///
    /// # Returns
    /// Mono float samples in [-1, 1] at `sample_rate()`, possibly empty.
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Sample rate of the samples returned by `read_samples`.
    fn sample_rate(&self) -> u32;
}

/// Mock capture source for testing.
///
/// Hands out scripted chunks one per read; once the script is exhausted,
/// reads return empty vectors. `started()` exposes a flag tests can watch
/// after the source has been moved into the capture pump.
#[derive(Debug, Clone)]
pub struct MockCaptureSource {
    started: Arc<AtomicBool>,
    chunks: Arc<Mutex<VecDeque<Vec<f32>>>>,
    sample_rate: u32,
    should_fail_start: bool,
    should_fail_stop: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockCaptureSource {
    /// Create a new mock capture source producing nothing.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            chunks: Arc::new(Mutex::new(VecDeque::new())),
            sample_rate,
            should_fail_start: false,
            should_fail_stop: false,
            should_fail_read: false,
            error_message: "mock capture error".to_string(),
        }
    }

    /// Queue chunks returned by successive reads.
    pub fn with_chunks(self, chunks: Vec<Vec<f32>>) -> Self {
        if let Ok(mut queue) = self.chunks.lock() {
            queue.extend(chunks);
        }
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Shared flag that is true while the source is started.
    pub fn started(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.started)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Append a chunk while the source is in use elsewhere.
    pub fn push_chunk(&self, chunk: Vec<f32>) {
        if let Ok(mut queue) = self.chunks.lock() {
            queue.push_back(chunk);
        }
    }

    fn failure(&self) -> LivelingoError {
        LivelingoError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl CaptureSource for MockCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(self.failure());
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            return Err(self.failure());
        }
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if self.should_fail_read {
            return Err(self.failure());
        }
        let mut queue = self.chunks.lock().map_err(|e| LivelingoError::AudioCapture {
            message: format!("Failed to lock mock buffer: {}", e),
        })?;
        Ok(queue.pop_front().unwrap_or_default())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
