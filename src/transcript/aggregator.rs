//! Accumulates transcription fragments into finalized turns.

use crate::defaults::HISTORY_CAPACITY;
use crate::transcript::history::{TranscriptHistory, TranscriptTurn};

/// Text gathered for the turn in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTranscription {
    pub source: String,
    pub target: String,
}

impl PendingTranscription {
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }
}

/// Turns streamed fragments into discrete turns at each turn boundary.
///
/// Finalized history outlives individual sessions; only the pending buffer is
/// dropped when a session ends.
#[derive(Debug, Clone)]
pub struct TranscriptAggregator {
    pending: PendingTranscription,
    history: TranscriptHistory,
}

impl Default for TranscriptAggregator {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl TranscriptAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: PendingTranscription::default(),
            history: TranscriptHistory::new(capacity),
        }
    }

    /// Append recognized text of the user's speech.
    pub fn source_fragment(&mut self, text: &str) {
        self.pending.source.push_str(text);
    }

    /// Append text of the translated output.
    pub fn target_fragment(&mut self, text: &str) {
        self.pending.target.push_str(text);
    }

    /// Close the current turn.
    ///
    /// Returns `None` and records nothing when no text arrived.
    pub fn turn_complete(&mut self) -> Option<TranscriptTurn> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return None;
        }
        let turn = TranscriptTurn::new(pending.source, pending.target);
        self.history.push(turn.clone());
        Some(turn)
    }

    /// Drop unfinished text without creating a turn.
    pub fn discard_pending(&mut self) {
        self.pending = PendingTranscription::default();
    }

    pub fn pending(&self) -> &PendingTranscription {
        &self.pending
    }

    pub fn history(&self) -> &TranscriptHistory {
        &self.history
    }

    /// Most recent turn, for "current subtitle" style consumers.
    pub fn latest(&self) -> Option<&TranscriptTurn> {
        self.history.latest()
    }
}
