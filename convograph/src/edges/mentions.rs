//! MentionsEdge: MENTIONS (Segment → Entity).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{object, Properties};

/// An entity occurring in a segment's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionsEdge {
    pub segment_id: String,
    pub entity_id: String,
    /// Character offset of the first case-insensitive occurrence, `-1` when the
    /// extractor returned text that does not appear verbatim.
    pub mention_position: i64,
    pub confidence_score: f64,
    pub mention_count: u32,
}

impl MentionsEdge {
    pub fn new(
        segment_id: &str,
        entity_id: &str,
        segment_text: &str,
        entity_text: &str,
        confidence: f64,
    ) -> Self {
        Self {
            segment_id: segment_id.to_string(),
            entity_id: entity_id.to_string(),
            mention_position: mention_position(segment_text, entity_text),
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
            "mention_position": self.mention_position,
            "confidence_score": self.confidence_score,
            "mention_count": self.mention_count,
        }))
    }
}

/// Character (not byte) index of `needle` in `haystack`, ignoring case.
fn mention_position(haystack: &str, needle: &str) -> i64 {
    let haystack = haystack.to_lowercase();
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return -1;
    }
    match haystack.find(&needle) {
        Some(byte_idx) => haystack[..byte_idx].chars().count() as i64,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_position_is_case_insensitive() {
        let edge = MentionsEdge::new("seg", "ent", "Call me at 555-111-2222", "555-111-2222", 0.8);
        assert_eq!(edge.mention_position, 11);

        assert_eq!(mention_position("Email BOB@x.io now", "bob@x.io"), 6);
        assert_eq!(mention_position("nothing here", "absent"), -1);
    }

    #[test]
    fn test_mention_position_counts_chars() {
        assert_eq!(mention_position("héllo Paris", "paris"), 6);
    }
}
