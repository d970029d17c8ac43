//! Audio frames, capture devices and format conversion.

#[cfg(feature = "cpal-audio")]
pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod device;
pub mod frame;
pub mod recorder;
pub mod resample;

pub use frame::AudioFrame;
pub use recorder::{CaptureSource, MockCaptureSource};
