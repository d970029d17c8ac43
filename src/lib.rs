//! livelingo - Real-time Japanese ⇄ Traditional Chinese speech translation
//!
//! Streams microphone audio to a live translation service and plays the
//! synthesized translation back gap-free while assembling a transcript.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod channel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transcript;

// Composition root - needs everything
#[cfg(all(feature = "cpal-audio", feature = "live-channel", feature = "cli"))]
pub mod app;

// Seams (capture → channel → playback)
pub use audio::recorder::CaptureSource;
pub use channel::{ChannelConnector, ChannelEvent};
pub use playback::OutputClock;
pub use session::AudioBackend;

// Core components
pub use codec::{WireAudioPayload, decode, encode};
pub use playback::{PlaybackHandle, PlaybackScheduler};
pub use session::{SessionController, SessionEvent, SessionState};
pub use transcript::{TranscriptAggregator, TranscriptTurn};

// Error handling
pub use error::{LivelingoError, Result};

// Config
pub use config::{Config, LanguageMode};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
