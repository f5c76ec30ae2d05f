//! FollowsEdge: FOLLOWS (Segment → next Segment).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::nodes::SegmentNode;
use crate::types::{object, Properties};

/// Link between two adjacent segments of the time-ordered chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowsEdge {
    pub from_segment_id: String,
    pub to_segment_id: String,
    /// `next.start - previous.end`. Negative for overlapping speech; never clamped.
    pub time_gap: f64,
    pub speaker_change: bool,
}

impl FollowsEdge {
    pub fn between(previous: &SegmentNode, next: &SegmentNode) -> Self {
        Self {
            from_segment_id: previous.id.clone(),
            to_segment_id: next.id.clone(),
            time_gap: next.start_time - previous.end_time,
            speaker_change: next.speaker_id != previous.speaker_id,
        }
    }

    pub fn to_storage_properties(&self) -> Properties {
        object(json!({
            "time_gap": self.time_gap,
            "speaker_change": self.speaker_change,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, start: f64, end: f64, speaker: &str) -> SegmentNode {
        SegmentNode {
            id: id.to_string(),
            conversation_id: "c".to_string(),
            text: String::new(),
            start_time: start,
            end_time: end,
            speaker_id: speaker.to_string(),
            confidence_score: 1.0,
            sentiment: None,
        }
    }

    #[test]
    fn test_overlap_gives_negative_gap() {
        let edge = FollowsEdge::between(
            &segment("a", 0.0, 5.0, "s1"),
            &segment("b", 4.0, 6.0, "s1"),
        );
        assert_eq!(edge.time_gap, -1.0);
        assert!(!edge.speaker_change);
    }
}
