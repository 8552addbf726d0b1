//! Transcript lines arriving on the agent's data channel topic.

use crate::error::DecodeError;
use chrono::Utc;
use voxgate_types::TranscriptEvent;

/// Decodes transcript payloads for one connection attempt.
///
/// Each message is handled on its own and forgotten. Nothing is buffered, so
/// a slow consumer simply misses lines.
#[derive(Debug)]
pub struct TranscriptListener {
    topic: String,
    next_sequence: u64,
}

impl TranscriptListener {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            next_sequence: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Handles one data channel message.
    ///
    /// Returns `None` for other topics and for payloads that are not UTF-8.
    pub fn on_message(&mut self, topic: Option<&str>, payload: &[u8]) -> Option<TranscriptEvent> {
        if topic != Some(self.topic.as_str()) {
            return None;
        }
        match decode(payload) {
            Ok(text) => {
                let event = TranscriptEvent {
                    sequence: self.next_sequence,
                    text,
                    received_at: Utc::now(),
                };
                self.next_sequence += 1;
                tracing::info!(sequence = event.sequence, text = %event.text, "[Agent]");
                Some(event)
            }
            Err(e) => {
                tracing::debug!(len = payload.len(), "dropping transcript payload: {}", e);
                None
            }
        }
    }
}

fn decode(payload: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(payload)?.to_owned())
}
