//! Session lifecycle states and the notifications observers receive.

use crate::transcript::TranscriptTurn;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Closing,
    Errored,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Errored => "errored",
        }
    }

    /// Whether channel events are still being processed.
    ///
    /// While `Connecting` the controller further limits this to `Opened`,
    /// `Error` and `Closed`.
    pub fn accepts_events(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one started session. Never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification pushed to session observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A turn was finalized and added to the history.
    Turn(TranscriptTurn),
    /// User-facing error message.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_events() {
        assert!(SessionState::Connecting.accepts_events());
        assert!(SessionState::Active.accepts_events());
        assert!(!SessionState::Idle.accepts_events());
        assert!(!SessionState::Closing.accepts_events());
        assert!(!SessionState::Errored.accepts_events());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionId(3).to_string(), "#3");
    }
}
