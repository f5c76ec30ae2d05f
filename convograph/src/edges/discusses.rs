//! DiscussesEdge: DISCUSSES (Speaker → Topic).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{object, Properties};

/// A speaker raising a topic. Repeat mentions in one run bump `mention_count`
/// on the same edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussesEdge {
    pub speaker_id: String,
    pub topic_id: String,
    pub mention_count: u32,
    /// Highest topic confidence among the mentions.
    pub context_relevance: f64,
}

impl DiscussesEdge {
    pub fn new(speaker_id: &str, topic_id: &str, confidence: f64) -> Self {
        Self {
            speaker_id: speaker_id.to_string(),
            topic_id: topic_id.to_string(),
            mention_count: 1,
            context_relevance: confidence,
        }
    }

    pub fn record_mention(&mut self, confidence: f64) {
        self.mention_count += 1;
        self.context_relevance = self.context_relevance.max(confidence);
    }

    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "mention_count": self.mention_count,
            "context_relevance": self.context_relevance,
        }))
    }
}
