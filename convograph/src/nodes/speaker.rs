//! SpeakerNode: one diarization speaker within a conversation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::identity;
use crate::types::{object, Properties};

/// A speaker, aggregated as the conversation's segments fold in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerNode {
    pub id: String,
    pub conversation_id: String,
    /// Raw diarization label (`"0"`, `"s1"`, ...).
    pub label: String,
    pub name: String,
    /// Sum of segment durations, seconds.
    pub total_speaking_time: f64,
    pub turn_count: u32,
    /// `total_speaking_time / conversation duration`; 0 when the duration is 0.
    pub participation_ratio: f64,
}

impl SpeakerNode {
    pub fn new(conversation_id: &str, label: &str) -> Self {
        Self {
            id: identity::speaker_id(conversation_id, label),
            conversation_id: conversation_id.to_string(),
            label: label.trim().to_string(),
            name: identity::speaker_name(label),
            total_speaking_time: 0.0,
            turn_count: 0,
            participation_ratio: 0.0,
        }
    }

    /// Fold one segment of `seconds` into the totals.
    pub fn record_turn(&mut self, seconds: f64) {
        self.total_speaking_time += seconds;
        self.turn_count += 1;
    }

    /// Compute the ratio once every turn has been recorded.
    pub fn finalize(&mut self, conversation_duration: f64) {
        self.participation_ratio = if conversation_duration > 0.0 {
            self.total_speaking_time / conversation_duration
        } else {
            0.0
        };
    }

    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "id": self.id,
            "conversation_id": self.conversation_id,
            "label": self.label,
            "name": self.name,
            "total_speaking_time": self.total_speaking_time,
            "turn_count": self.turn_count,
            "participation_ratio": self.participation_ratio,
        }))
    }
}
