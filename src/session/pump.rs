//! Capture pump: microphone samples to encoded outbound frames.

use crate::audio::recorder::CaptureSource;
use crate::codec::{WireAudioPayload, encode};
use crate::defaults::{CAPTURE_POLL_MS, MAX_CAPTURE_ERRORS};
use crate::error::{LivelingoError, Result};
use crate::session::state::SessionId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Reported once when the pump gives up on its capture source.
#[derive(Debug)]
pub struct CaptureFailure {
    pub session: SessionId,
    /// The last read error.
    pub error: LivelingoError,
}

/// Dedicated thread that drains a started capture source, slices the samples
/// into fixed-size frames and enqueues each one encoded.
///
/// The running flag is checked before every send, so no frame is enqueued
/// after `stop` returns. A trailing partial frame is discarded. If the source
/// keeps failing, the pump exits and reports a [`CaptureFailure`] tagged
/// with its session.
pub struct CapturePump {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CapturePump {
    /// Start `source` and begin pumping. Fails if the source cannot start.
    pub fn spawn(
        mut source: Box<dyn CaptureSource>,
        outbound: UnboundedSender<WireAudioPayload>,
        frame_samples: usize,
        session: SessionId,
        failures: UnboundedSender<CaptureFailure>,
    ) -> Result<Self> {
        source.start()?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let frame_samples = frame_samples.max(1);

        let handle = thread::spawn(move || {
            let poll_interval = Duration::from_millis(CAPTURE_POLL_MS);
            let sample_rate = source.sample_rate();
            let mut pending: Vec<f32> = Vec::with_capacity(frame_samples * 2);
            let mut consecutive_errors: u32 = 0;
            let mut frames_sent: u64 = 0;

            'pump: while thread_running.load(Ordering::SeqCst) {
                match source.read_samples() {
                    Ok(samples) => {
                        consecutive_errors = 0;
                        pending.extend_from_slice(&samples);
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CAPTURE_ERRORS {
                            log::warn!("audio capture failed {consecutive_errors} times in a row: {e}");
                            // A deliberate stop is not a failure.
                            if thread_running.load(Ordering::SeqCst) {
                                let failure = CaptureFailure { session, error: e };
                                if failures.send(failure).is_err() {
                                    log::debug!("session gone before capture failure report");
                                }
                            }
                            break;
                        }
                    }
                }

                while pending.len() >= frame_samples {
                    let frame: Vec<f32> = pending.drain(..frame_samples).collect();
                    if !thread_running.load(Ordering::SeqCst) {
                        break 'pump;
                    }
                    if outbound.send(encode(&frame, sample_rate)).is_err() {
                        log::debug!("outbound queue closed, capture pump exiting");
                        break 'pump;
                    }
                    frames_sent += 1;
                }

                thread::sleep(poll_interval);
            }

            log::debug!("capture pump sent {frames_sent} frame(s)");
            if let Err(e) = source.stop() {
                eprintln!("livelingo: failed to stop audio capture: {e}");
            }
        });

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the pump to stop and wait briefly for it to release the device.
    ///
    /// Idempotent. A thread that does not finish within a second is detached.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + Duration::from_secs(1);
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                eprintln!("livelingo: capture pump did not stop in time, detaching");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if let Err(panic_info) = handle.join() {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            eprintln!("livelingo: capture pump panicked: {msg}");
        }
    }
}

impl Drop for CapturePump {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recorder::MockCaptureSource;
    use crate::codec::decode;
    use tokio::sync::mpsc;

    fn spawn(
        source: MockCaptureSource,
        tx: mpsc::UnboundedSender<WireAudioPayload>,
        frame_samples: usize,
    ) -> Result<CapturePump> {
        let (failures, _) = mpsc::unbounded_channel();
        CapturePump::spawn(Box::new(source), tx, frame_samples, SessionId(1), failures)
    }

    fn recv_within(
        rx: &mut mpsc::UnboundedReceiver<WireAudioPayload>,
        timeout: Duration,
    ) -> Option<WireAudioPayload> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(payload) = rx.try_recv() {
                return Some(payload);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_pump_slices_fixed_frames() {
        // 10 samples in uneven chunks, frames of 4: two frames, 2 left over.
        let source = MockCaptureSource::new(16000)
            .with_chunks(vec![vec![0.5; 3], vec![0.5; 4], vec![0.5; 3]]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut pump = spawn(source, tx, 4).unwrap();
        let first = recv_within(&mut rx, Duration::from_secs(2)).unwrap();
        let second = recv_within(&mut rx, Duration::from_secs(2)).unwrap();
        pump.stop();

        assert_eq!(first.sample_rate(), 16000);
        assert_eq!(decode(&first, 16000, 1).unwrap().frame_count(), 4);
        assert_eq!(decode(&second, 16000, 1).unwrap().frame_count(), 4);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_stops_source() {
        let source = MockCaptureSource::new(16000);
        let started = source.started();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut pump = spawn(source, tx, 4).unwrap();
        assert!(started.load(Ordering::SeqCst));

        pump.stop();
        pump.stop();
        assert!(!started.load(Ordering::SeqCst));
        assert!(!pump.is_running());
    }

    #[test]
    fn test_no_send_after_stop() {
        let source = MockCaptureSource::new(16000);
        let feeder = source.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut pump = spawn(source, tx, 4).unwrap();
        pump.stop();
        feeder.push_chunk(vec![0.1; 8]);
        thread::sleep(Duration::from_millis(50));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_failure_is_returned() {
        let source = MockCaptureSource::new(16000).with_start_failure();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(spawn(source, tx, 4).is_err());
    }

    #[test]
    fn test_pump_exits_when_queue_closed() {
        let source = MockCaptureSource::new(16000).with_chunks(vec![vec![0.0; 8]]);
        let started = source.started();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let mut pump = spawn(source, tx, 4).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while pump.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!pump.is_running());
        assert!(!started.load(Ordering::SeqCst));
        pump.stop();
    }

    #[test]
    fn test_repeated_read_failures_are_reported() {
        let source = MockCaptureSource::new(16000)
            .with_read_failure()
            .with_error_message("device unplugged");
        let started = source.started();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (failures_tx, mut failures) = mpsc::unbounded_channel();

        let pump =
            CapturePump::spawn(Box::new(source), tx, 4, SessionId(7), failures_tx).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while pump.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(!pump.is_running());
        assert!(!started.load(Ordering::SeqCst));
        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.session, SessionId(7));
        assert!(matches!(
            failure.error,
            LivelingoError::AudioCapture { ref message } if message == "device unplugged"
        ));
        assert!(failures.try_recv().is_err());
    }

    #[test]
    fn test_stopped_pump_reports_nothing() {
        let source = MockCaptureSource::new(16000);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (failures_tx, mut failures) = mpsc::unbounded_channel();

        let mut pump =
            CapturePump::spawn(Box::new(source), tx, 4, SessionId(1), failures_tx).unwrap();
        pump.stop();

        assert!(failures.try_recv().is_err());
    }
}
