//! Conversation transcript assembly.

pub mod aggregator;
pub mod history;

pub use aggregator::{PendingTranscription, TranscriptAggregator};
pub use history::{TranscriptHistory, TranscriptTurn};
