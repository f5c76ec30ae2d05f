//! ConversationNode: root of one processed conversation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{object, Properties};

/// One transcribed conversation, the root of its CONTAINS edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    /// The job / request ID the conversation was processed under.
    pub id: String,
    pub audio_file_id: String,
    /// Seconds. Engine-reported when available, otherwise the last segment end.
    pub duration: f64,
    pub language: String,
    pub speaker_count: usize,
    pub topic_count: usize,
    pub entity_count: usize,
    pub segment_count: usize,
}

impl ConversationNode {
    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "id": self.id,
            "audio_file_id": self.audio_file_id,
            "duration": self.duration,
            "language": self.language,
            "speaker_count": self.speaker_count,
            "topic_count": self.topic_count,
            "entity_count": self.entity_count,
            "segment_count": self.segment_count,
            "processing_status": "completed",
        }))
    }
}
