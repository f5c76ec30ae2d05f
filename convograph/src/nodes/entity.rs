//! EntityNode: a concrete entity (phone number, email, person, ...) mentioned in speech.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::identity;
use crate::types::{object, Properties};

/// An extracted entity; same dedup contract as topics, keyed by type and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    /// `identity::entity_id(entity_type, text)`.
    pub id: String,
    pub text: String,
    /// Uppercase kind, e.g. `PHONE`, `EMAIL`, `PERSON`.
    pub entity_type: String,
    pub confidence_score: f64,
    pub mention_count: u32,
}

impl EntityNode {
    pub fn new(text: &str, entity_type: &str, confidence: f64) -> Self {
        Self {
            id: identity::entity_id(entity_type, text),
            text: text.trim().to_string(),
            entity_type: entity_type.trim().to_uppercase(),
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
            "text": self.text,
            "type": self.entity_type,
            "confidence_score": self.confidence_score,
            "mention_count": self.mention_count,
        }))
    }
}
