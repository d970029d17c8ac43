//! Gapless playback scheduling with hard interruption.

use crate::audio::frame::AudioFrame;
use crate::playback::clock::{HandleId, OutputClock, PlaybackError};
use std::collections::BTreeMap;
use std::time::Duration;

/// One buffer placed on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackHandle {
    pub id: HandleId,
    pub start_at: Duration,
    pub duration: Duration,
}

impl PlaybackHandle {
    /// Timeline instant at which this buffer finishes.
    pub fn end(&self) -> Duration {
        self.start_at + self.duration
    }
}

/// Schedules decoded frames back-to-back on an output clock.
///
/// `next_start_time` only moves forward, except on `interrupt`, which resets
/// it to zero so the next frame starts at the clock's current time. The live
/// set holds exactly the handles that were started and have neither
/// completed nor been interrupted.
///
/// All methods take `&mut self`; callers serialize access by owning the
/// scheduler from a single task.
pub struct PlaybackScheduler {
    clock: Box<dyn OutputClock>,
    next_start_time: Duration,
    live: BTreeMap<HandleId, PlaybackHandle>,
    next_id: HandleId,
    released: bool,
}

impl PlaybackScheduler {
    pub fn new(clock: Box<dyn OutputClock>) -> Self {
        Self {
            clock,
            next_start_time: Duration::ZERO,
            live: BTreeMap::new(),
            next_id: 0,
            released: false,
        }
    }

    /// Queue `frame` right after the previous one, or now if playback ran dry.
    pub fn schedule(&mut self, frame: &AudioFrame) -> Result<PlaybackHandle, PlaybackError> {
        if self.released {
            return Err(PlaybackError::Released);
        }
        self.reap_completed();

        let requested = self.next_start_time.max(self.clock.now());
        let id = self.next_id;
        // The device may have moved on since `now()`; chain from where the
        // buffer really landed.
        let start_at = self.clock.start(id, frame, requested)?;

        let handle = PlaybackHandle {
            id,
            start_at,
            duration: frame.duration(),
        };
        self.next_id += 1;
        self.next_start_time = handle.end();
        self.live.insert(id, handle);
        Ok(handle)
    }

    /// Stop everything queued or playing and restart the timeline baseline.
    pub fn interrupt(&mut self) {
        for id in self.live.keys() {
            if let Err(e) = self.clock.stop(*id) {
                // Already finished on the device; nothing left to silence.
                log::debug!("ignoring stop failure: {e}");
            }
        }
        if !self.live.is_empty() {
            log::debug!("interrupted {} buffer(s)", self.live.len());
        }
        self.live.clear();
        self.next_start_time = Duration::ZERO;
    }

    /// Interrupt and release the output device. Idempotent.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.interrupt();
        self.clock.release();
        self.released = true;
    }

    /// Drop handles whose buffers finished on their own.
    pub fn reap_completed(&mut self) -> usize {
        let mut reaped = 0;
        for id in self.clock.take_completed() {
            if self.live.remove(&id).is_some() {
                reaped += 1;
            }
        }
        reaped
    }

    pub fn next_start_time(&self) -> Duration {
        self.next_start_time
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live handles in scheduling order.
    pub fn live_handles(&self) -> impl Iterator<Item = &PlaybackHandle> {
        self.live.values()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Current output clock time.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::clock::ManualClock;

    fn frame_ms(ms: u64) -> AudioFrame {
        AudioFrame::mono(vec![0.0; (ms * 24) as usize], 24000)
    }

    fn scheduler() -> (PlaybackScheduler, ManualClock) {
        let clock = ManualClock::new();
        (PlaybackScheduler::new(Box::new(clock.clone())), clock)
    }

    #[test]
    fn test_two_frames_from_zero_are_contiguous() {
        let (mut scheduler, clock) = scheduler();

        let first = scheduler.schedule(&frame_ms(100)).unwrap();
        let second = scheduler.schedule(&frame_ms(150)).unwrap();

        assert_eq!(first.start_at, Duration::ZERO);
        assert_eq!(second.start_at, Duration::from_millis(100));
        assert_eq!(second.end(), Duration::from_millis(250));
        assert_eq!(scheduler.next_start_time(), Duration::from_millis(250));

        let started = clock.started();
        assert_eq!(started.len(), 2);
        assert_eq!(started[0].end(), started[1].start_at);
    }

    #[test]
    fn test_many_frames_never_overlap_or_gap() {
        let (mut scheduler, clock) = scheduler();
        let durations = [20u64, 40, 10, 250, 5, 80];

        let handles: Vec<_> = durations
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                // Jittery arrival: the clock advances between calls but stays
                // behind the queued backlog.
                clock.advance(Duration::from_millis(i as u64));
                scheduler.schedule(&frame_ms(*ms)).unwrap()
            })
            .collect();

        for pair in handles.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start_at);
        }
    }

    #[test]
    fn test_late_start_moves_the_cursor() {
        let (mut scheduler, clock) = scheduler();
        clock.set_advance_on_start(Duration::from_millis(5));

        let first = scheduler.schedule(&frame_ms(100)).unwrap();
        let second = scheduler.schedule(&frame_ms(100)).unwrap();

        assert_eq!(first.start_at, Duration::from_millis(5));
        assert_eq!(second.start_at, first.end());
        assert_eq!(scheduler.next_start_time(), Duration::from_millis(205));
        let started = clock.started();
        assert_eq!(started[0].end(), started[1].start_at);
    }

    #[test]
    fn test_stalled_consumer_schedules_at_now() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(100)).unwrap();

        clock.set_now(Duration::from_secs(5));
        let late = scheduler.schedule(&frame_ms(100)).unwrap();

        assert_eq!(late.start_at, Duration::from_secs(5));
    }

    #[test]
    fn test_interrupt_then_schedule_starts_at_now() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(500)).unwrap();
        scheduler.schedule(&frame_ms(500)).unwrap();
        clock.set_now(Duration::from_millis(120));

        scheduler.interrupt();
        assert_eq!(scheduler.next_start_time(), Duration::ZERO);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(clock.stopped(), vec![0, 1]);

        let fresh = scheduler.schedule(&frame_ms(100)).unwrap();
        assert_eq!(fresh.start_at, Duration::from_millis(120));
    }

    #[test]
    fn test_interrupt_ignores_already_finished_buffers() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(10)).unwrap();
        scheduler.schedule(&frame_ms(500)).unwrap();
        clock.set_now(Duration::from_millis(50));

        // First buffer finished but has not been reaped yet.
        scheduler.interrupt();

        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(clock.stopped(), vec![1]);
    }

    #[test]
    fn test_completed_handles_leave_live_set() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(100)).unwrap();
        scheduler.schedule(&frame_ms(100)).unwrap();
        assert_eq!(scheduler.live_count(), 2);

        clock.set_now(Duration::from_millis(100));
        assert_eq!(scheduler.reap_completed(), 1);
        assert_eq!(scheduler.live_count(), 1);
        assert_eq!(scheduler.live_handles().next().map(|h| h.id), Some(1));

        clock.set_now(Duration::from_millis(200));
        assert_eq!(scheduler.reap_completed(), 1);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.reap_completed(), 0);
    }

    #[test]
    fn test_schedule_reaps_before_adding() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(100)).unwrap();
        clock.set_now(Duration::from_millis(300));

        scheduler.schedule(&frame_ms(100)).unwrap();
        assert_eq!(scheduler.live_count(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_releases() {
        let (mut scheduler, clock) = scheduler();
        scheduler.schedule(&frame_ms(100)).unwrap();

        scheduler.shutdown();
        scheduler.shutdown();

        assert!(clock.is_released());
        assert!(scheduler.is_released());
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(
            scheduler.schedule(&frame_ms(100)),
            Err(PlaybackError::Released)
        );
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let (mut scheduler, _clock) = scheduler();
        let a = scheduler.schedule(&frame_ms(10)).unwrap();
        scheduler.interrupt();
        let b = scheduler.schedule(&frame_ms(10)).unwrap();
        assert_ne!(a.id, b.id);
    }
}
