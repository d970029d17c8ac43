//! Finalized turns and the bounded history that holds them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// One completed exchange: what was heard and what it was translated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptTurn {
    id: Uuid,
    timestamp: DateTime<Utc>,
    source_text: String,
    target_text: String,
}

impl TranscriptTurn {
    pub(crate) fn new(source_text: String, target_text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_text,
            target_text,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the turn was completed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }
}

/// Newest-first list of turns that never grows past its capacity.
#[derive(Debug, Clone)]
pub struct TranscriptHistory {
    turns: VecDeque<TranscriptTurn>,
    capacity: usize,
}

impl TranscriptHistory {
    /// A capacity of zero keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest turns past capacity.
    pub fn push(&mut self, turn: TranscriptTurn) {
        self.turns.push_front(turn);
        self.turns.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&TranscriptTurn> {
        self.turns.front()
    }

    /// Turns from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &TranscriptTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Owned copy, newest first.
    pub fn to_vec(&self) -> Vec<TranscriptTurn> {
        self.turns.iter().cloned().collect()
    }
}
