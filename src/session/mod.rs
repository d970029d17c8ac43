//! Streaming session orchestration.
//!
//! The controller is the only component that knows about capture, the
//! channel, playback and the transcript at once:
//!
//! ```text
//! microphone -> CapturePump -> encode -> outbound queue -> service
//! service -> inbound events -> dispatch -> { TranscriptAggregator
//!                                           | decode -> PlaybackScheduler }
//! ```

pub mod backend;
pub mod controller;
pub mod pump;
pub mod state;

#[cfg(feature = "cpal-audio")]
pub use backend::CpalBackend;
pub use backend::{AudioBackend, MockAudioBackend};
pub use controller::SessionController;
pub use pump::{CaptureFailure, CapturePump};
pub use state::{SessionEvent, SessionId, SessionState};
