//! Output timeline abstraction.

use crate::audio::frame::AudioFrame;
use crate::error::LivelingoError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Identifier of one buffer placed on the output timeline.
pub type HandleId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("output device already released")]
    Released,

    #[error("buffer {id} is not playing")]
    NotPlaying { id: HandleId },

    #[error("output device error: {message}")]
    Device { message: String },
}

impl From<PlaybackError> for LivelingoError {
    fn from(error: PlaybackError) -> Self {
        LivelingoError::AudioPlayback {
            message: error.to_string(),
        }
    }
}

/// Output audio clock.
///
/// Exposes a monotonically increasing "current time" and plays buffers at a
/// requested timeline instant. Implementations report natural completion
/// through `take_completed`; stopped buffers are never reported.
pub trait OutputClock: Send {
    /// Current position of the output timeline.
    fn now(&self) -> Duration;

    /// Play `frame` starting at `at` on the timeline.
    ///
    /// Returns the instant the buffer actually starts. It is later than `at`
    /// when the timeline already moved past `at`, never earlier.
    fn start(
        &mut self,
        id: HandleId,
        frame: &AudioFrame,
        at: Duration,
    ) -> Result<Duration, PlaybackError>;

    /// Stop a queued or playing buffer.
    ///
    /// # Errors
    /// `NotPlaying` when the buffer already finished or was never started.
    fn stop(&mut self, id: HandleId) -> Result<(), PlaybackError>;

    /// Buffers that finished on their own since the last call.
    fn take_completed(&mut self) -> Vec<HandleId>;

    /// Release the output device. Idempotent.
    fn release(&mut self);
}

/// Record of one `start` call on a [`ManualClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledBuffer {
    pub id: HandleId,
    pub start_at: Duration,
    pub duration: Duration,
}

impl ScheduledBuffer {
    pub fn end(&self) -> Duration {
        self.start_at + self.duration
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    started: Vec<ScheduledBuffer>,
    playing: Vec<ScheduledBuffer>,
    stopped: Vec<HandleId>,
    released: bool,
    advance_on_start: Duration,
}

/// Deterministic clock for tests: time only moves when told to.
///
/// Clones share state, so a test can keep one clone for inspection after
/// handing another to a scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        // A poisoned test clock still holds usable data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_now(&self, now: Duration) {
        self.lock().now = now;
    }

    pub fn advance(&self, by: Duration) {
        self.lock().now += by;
    }

    /// Move time forward by `by` inside every `start`, as a device callback
    /// running between `now()` and `start` would.
    pub fn set_advance_on_start(&self, by: Duration) {
        self.lock().advance_on_start = by;
    }

    /// Every buffer ever started, in call order.
    pub fn started(&self) -> Vec<ScheduledBuffer> {
        self.lock().started.clone()
    }

    /// Ids of buffers stopped before they finished.
    pub fn stopped(&self) -> Vec<HandleId> {
        self.lock().stopped.clone()
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }
}

impl OutputClock for ManualClock {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn start(
        &mut self,
        id: HandleId,
        frame: &AudioFrame,
        at: Duration,
    ) -> Result<Duration, PlaybackError> {
        let mut state = self.lock();
        if state.released {
            return Err(PlaybackError::Released);
        }
        let advance = state.advance_on_start;
        state.now += advance;
        let buffer = ScheduledBuffer {
            id,
            start_at: at.max(state.now),
            duration: frame.duration(),
        };
        state.started.push(buffer);
        state.playing.push(buffer);
        Ok(buffer.start_at)
    }

    fn stop(&mut self, id: HandleId) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        let now = state.now;
        match state.playing.iter().position(|b| b.id == id) {
            Some(index) if state.playing[index].end() > now => {
                state.playing.remove(index);
                state.stopped.push(id);
                Ok(())
            }
            _ => Err(PlaybackError::NotPlaying { id }),
        }
    }

    fn take_completed(&mut self) -> Vec<HandleId> {
        let mut state = self.lock();
        let now = state.now;
        let (done, still_playing): (Vec<_>, Vec<_>) =
            state.playing.drain(..).partition(|b| b.end() <= now);
        state.playing = still_playing;
        done.into_iter().map(|b| b.id).collect()
    }

    fn release(&mut self) {
        let mut state = self.lock();
        state.playing.clear();
        state.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_ms(ms: u64) -> AudioFrame {
        AudioFrame::mono(vec![0.0; (ms * 24) as usize], 24000)
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(30));
        clock.advance(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(50));
        clock.set_now(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_completion_reported_once() {
        let mut clock = ManualClock::new();
        clock.start(1, &frame_ms(100), Duration::ZERO).unwrap();

        assert!(clock.take_completed().is_empty());
        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.take_completed(), vec![1]);
        assert!(clock.take_completed().is_empty());
    }

    #[test]
    fn test_stop_before_end_suppresses_completion() {
        let mut clock = ManualClock::new();
        clock.start(7, &frame_ms(100), Duration::ZERO).unwrap();
        clock.stop(7).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(clock.take_completed().is_empty());
        assert_eq!(clock.stopped(), vec![7]);
    }

    #[test]
    fn test_stop_after_end_is_not_playing() {
        let mut clock = ManualClock::new();
        clock.start(3, &frame_ms(10), Duration::ZERO).unwrap();
        clock.advance(Duration::from_millis(10));
        assert_eq!(clock.stop(3), Err(PlaybackError::NotPlaying { id: 3 }));
        assert_eq!(clock.stop(99), Err(PlaybackError::NotPlaying { id: 99 }));
    }

    #[test]
    fn test_start_never_lands_behind_now() {
        let mut clock = ManualClock::new();
        clock.set_now(Duration::from_millis(40));
        assert_eq!(
            clock.start(1, &frame_ms(10), Duration::from_millis(100)),
            Ok(Duration::from_millis(100))
        );
        assert_eq!(
            clock.start(2, &frame_ms(10), Duration::from_millis(10)),
            Ok(Duration::from_millis(40))
        );

        clock.set_advance_on_start(Duration::from_millis(5));
        assert_eq!(
            clock.start(3, &frame_ms(10), Duration::from_millis(40)),
            Ok(Duration::from_millis(45))
        );
        assert_eq!(clock.started()[2].start_at, Duration::from_millis(45));
    }

    #[test]
    fn test_release_rejects_new_buffers() {
        let mut clock = ManualClock::new();
        clock.release();
        clock.release();
        assert!(clock.is_released());
        assert_eq!(
            clock.start(1, &frame_ms(10), Duration::ZERO),
            Err(PlaybackError::Released)
        );
    }

    #[test]
    fn test_playback_error_converts_to_device_error() {
        let error: LivelingoError = PlaybackError::Released.into();
        assert_eq!(error.category(), crate::error::ErrorCategory::Device);
    }
}
