//! Playback scheduling onto an output clock.

pub mod clock;
#[cfg(feature = "cpal-audio")]
pub mod device;
pub mod scheduler;

pub use clock::{HandleId, ManualClock, OutputClock, PlaybackError};
pub use scheduler::{PlaybackHandle, PlaybackScheduler};
