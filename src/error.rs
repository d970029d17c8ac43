//! Error types for livelingo.

use crate::codec::DecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivelingoError {
    // Configuration errors
    #[error("No API key configured. Set LIVELINGO_API_KEY or api.api_key in {hint}")]
    MissingCredential { hint: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio device errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    AudioPlayback { message: String },

    // Duplex channel errors
    #[error("Failed to open session channel: {message}")]
    ChannelOpen { message: String },

    #[error("Session channel protocol error: {message}")]
    ChannelProtocol { message: String },

    #[error("Session channel closed: {message}")]
    ChannelClosed { message: String },

    // Inbound audio
    #[error("Audio payload rejected: {0}")]
    Decode(#[from] DecodeError),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to decide how far an error propagates.
///
/// Config and Device errors abort `start()`, Channel errors tear the session
/// down, Decode errors only drop the offending frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Device,
    Channel,
    Decode,
    Io,
    Other,
}

impl LivelingoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LivelingoError::MissingCredential { .. }
            | LivelingoError::ConfigParse { .. }
            | LivelingoError::ConfigInvalidValue { .. }
            | LivelingoError::Config(_) => ErrorCategory::Config,
            LivelingoError::AudioDeviceNotFound { .. }
            | LivelingoError::AudioCapture { .. }
            | LivelingoError::AudioPlayback { .. } => ErrorCategory::Device,
            LivelingoError::ChannelOpen { .. }
            | LivelingoError::ChannelProtocol { .. }
            | LivelingoError::ChannelClosed { .. } => ErrorCategory::Channel,
            LivelingoError::Decode(_) => ErrorCategory::Decode,
            LivelingoError::Io(_) => ErrorCategory::Io,
            LivelingoError::Other(_) => ErrorCategory::Other,
        }
    }

    /// The single message shown to the user when this error ends a session.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Config => self.to_string(),
            ErrorCategory::Device => format!("Could not use the audio device. {}", self),
            ErrorCategory::Channel => format!("Connection error, please retry. {}", self),
            _ => format!("Session failed to start: {}", self),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LivelingoError>;
