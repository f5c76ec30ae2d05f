//! TopicNode: a discussion topic shared across conversations.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::identity;
use crate::types::{object, Properties};

/// A topic, one per distinct normalized name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    /// `identity::topic_id(name)`.
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    /// Highest confidence seen for this topic in the run.
    pub confidence_score: f64,
    pub mention_count: u32,
}

impl TopicNode {
    pub fn new(name: &str, keywords: Vec<String>, confidence: f64) -> Self {
        Self {
            id: identity::topic_id(name),
            name: name.trim().to_string(),
            keywords,
            confidence_score: confidence,
            mention_count: 1,
        }
    }

    pub fn record_mention(&mut self, confidence: f64) {
        self.mention_count += 1;
        self.confidence_score = self.confidence_score.max(confidence);
    }

    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "id": self.id,
            "name": self.name,
            "keywords": self.keywords,
            "confidence_score": self.confidence_score,
            "mention_count": self.mention_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_mention_keeps_max_confidence() {
        let mut topic = TopicNode::new(" Technology ", vec!["ai".into()], 0.5);
        topic.record_mention(0.3);
        topic.record_mention(0.9);
        assert_eq!(topic.name, "Technology");
        assert_eq!(topic.mention_count, 3);
        assert_eq!(topic.confidence_score, 0.9);
        assert_eq!(topic.id, identity::topic_id("technology"));
    }
}
