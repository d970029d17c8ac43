//! Default configuration constants for livelingo.
//!
//! Shared by the configuration types, the session controller and the
//! device backends so every layer agrees on rates and sizes.

/// Sample rate of captured microphone audio in Hz.
///
/// The remote service expects 16kHz mono 16-bit PCM input.
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Sample rate of synthesized audio returned by the remote service in Hz.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Channel count decoded frames are expanded to before playback.
pub const PLAYBACK_CHANNELS: u16 = 1;

/// Number of captured samples per outbound frame.
///
/// 4096 samples is 256ms at 16kHz.
pub const FRAME_SAMPLES: usize = 4096;

/// Number of finalized turns kept in the transcript history.
pub const HISTORY_CAPACITY: usize = 30;

/// Remote model used for the live session.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Prebuilt voice used for synthesized speech.
pub const DEFAULT_VOICE: &str = "Kore";

/// Bidirectional streaming endpoint of the live service.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// How often the capture pump drains the capture buffer, in milliseconds.
pub const CAPTURE_POLL_MS: u64 = 16;

/// How often the session loop reaps finished playback buffers, in milliseconds.
pub const PLAYBACK_REAP_MS: u64 = 50;

/// Consecutive capture read failures before the pump gives up.
pub const MAX_CAPTURE_ERRORS: u32 = 10;
