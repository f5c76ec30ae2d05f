//! SegmentNode: one time-bounded, single-speaker utterance.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::extraction::SegmentSentiment;
use crate::types::{object, Properties};

/// A transcript segment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentNode {
    /// `identity::segment_id(conversation_id, index)`.
    pub id: String,
    pub conversation_id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Speaker node ID.
    pub speaker_id: String,
    pub confidence_score: f64,
    /// Present only when sentiment analysis ran and succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SegmentSentiment>,
}

impl SegmentNode {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn to_storage_properties(&self) -> Properties {
        let mut props = object(json!({
            "id": self.id,
            "conversation_id": self.conversation_id,
            "text": self.text,
            "start_time": self.start_time,
            "end_time": self.end_time,
            "duration": self.duration(),
            "speaker_id": self.speaker_id,
            "confidence_score": self.confidence_score,
        }));
        if let Some(sentiment) = &self.sentiment {
            props.insert("sentiment".to_string(), json!(sentiment.label));
            props.insert("sentiment_confidence".to_string(), json!(sentiment.confidence));
            props.insert("emotions".to_string(), json!(sentiment.emotions));
            props.insert("sentiment_intensity".to_string(), json!(sentiment.intensity));
        }
        props
    }
}
