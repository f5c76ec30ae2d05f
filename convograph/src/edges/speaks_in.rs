//! SpeaksInEdge: SPEAKS_IN (Speaker → Conversation).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::nodes::SpeakerNode;
use crate::types::{object, Properties};

/// Aggregated participation of one speaker in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeaksInEdge {
    pub speaker_id: String,
    pub conversation_id: String,
    pub speaking_time: f64,
    pub turn_count: u32,
    pub participation_ratio: f64,
}

impl SpeaksInEdge {
    /// Build from a speaker whose totals are final.
    pub fn from_speaker(speaker: &SpeakerNode) -> Self {
        Self {
            speaker_id: speaker.id.clone(),
            conversation_id: speaker.conversation_id.clone(),
            speaking_time: speaker.total_speaking_time,
            turn_count: speaker.turn_count,
            participation_ratio: speaker.participation_ratio,
        }
    }

    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "speaking_time": self.speaking_time,
            "turn_count": self.turn_count,
            "participation_ratio": self.participation_ratio,
        }))
    }
}
