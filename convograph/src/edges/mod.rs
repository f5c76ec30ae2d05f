//! Relationship types for the conversation graph.
//!
//! - [`SpeaksInEdge`]: SPEAKS_IN (speaker → conversation)
//! - [`DiscussesEdge`]: DISCUSSES (speaker → topic)
//! - [`MentionsEdge`]: MENTIONS (segment → entity)
//! - [`FollowsEdge`]: FOLLOWS (segment → next segment)
//! - [`ContainsEdge`]: CONTAINS (conversation → segment)

pub mod contains;
pub mod discusses;
pub mod follows;
pub mod mentions;
pub mod speaks_in;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nodes::NodeType;
use crate::types::Properties;

pub use contains::ContainsEdge;
pub use discusses::DiscussesEdge;
pub use follows::FollowsEdge;
pub use mentions::MentionsEdge;
pub use speaks_in::SpeaksInEdge;

/// Relationship kind. Doubles as the storage type / edge collection name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    SpeaksIn,
    Discusses,
    Mentions,
    Follows,
    Contains,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::SpeaksIn,
        RelationshipType::Discusses,
        RelationshipType::Mentions,
        RelationshipType::Follows,
        RelationshipType::Contains,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::SpeaksIn => "SPEAKS_IN",
            RelationshipType::Discusses => "DISCUSSES",
            RelationshipType::Mentions => "MENTIONS",
            RelationshipType::Follows => "FOLLOWS",
            RelationshipType::Contains => "CONTAINS",
        }
    }

    /// `(source, target)` node kinds.
    pub fn endpoints(self) -> (NodeType, NodeType) {
        match self {
            RelationshipType::SpeaksIn => (NodeType::Speaker, NodeType::Conversation),
            RelationshipType::Discusses => (NodeType::Speaker, NodeType::Topic),
            RelationshipType::Mentions => (NodeType::Segment, NodeType::Entity),
            RelationshipType::Follows => (NodeType::Segment, NodeType::Segment),
            RelationshipType::Contains => (NodeType::Conversation, NodeType::Segment),
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any relationship of the conversation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "relationship_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphRelationship {
    SpeaksIn(SpeaksInEdge),
    Discusses(DiscussesEdge),
    Mentions(MentionsEdge),
    Follows(FollowsEdge),
    Contains(ContainsEdge),
}

impl GraphRelationship {
    pub fn relationship_type(&self) -> RelationshipType {
        match self {
            GraphRelationship::SpeaksIn(_) => RelationshipType::SpeaksIn,
            GraphRelationship::Discusses(_) => RelationshipType::Discusses,
            GraphRelationship::Mentions(_) => RelationshipType::Mentions,
            GraphRelationship::Follows(_) => RelationshipType::Follows,
            GraphRelationship::Contains(_) => RelationshipType::Contains,
        }
    }

    pub fn from_id(&self) -> &str {
        match self {
            GraphRelationship::SpeaksIn(e) => &e.speaker_id,
            GraphRelationship::Discusses(e) => &e.speaker_id,
            GraphRelationship::Mentions(e) => &e.segment_id,
            GraphRelationship::Follows(e) => &e.from_segment_id,
            GraphRelationship::Contains(e) => &e.conversation_id,
        }
    }

    pub fn to_id(&self) -> &str {
        match self {
            GraphRelationship::SpeaksIn(e) => &e.conversation_id,
            GraphRelationship::Discusses(e) => &e.topic_id,
            GraphRelationship::Mentions(e) => &e.entity_id,
            GraphRelationship::Follows(e) => &e.to_segment_id,
            GraphRelationship::Contains(e) => &e.segment_id,
        }
    }

    pub fn to_storage_properties(&self) -> Properties {
        match self {
            GraphRelationship::SpeaksIn(e) => e.to_storage_properties(),
            GraphRelationship::Discusses(e) => e.to_storage_properties(),
            GraphRelationship::Mentions(e) => e.to_storage_properties(),
            GraphRelationship::Follows(e) => e.to_storage_properties(),
            GraphRelationship::Contains(e) => e.to_storage_properties(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_dispatch() {
        let rel = GraphRelationship::Contains(ContainsEdge {
            conversation_id: "conv".to_string(),
            segment_id: "conv_seg_0".to_string(),
            position: 0,
        });
        assert_eq!(rel.relationship_type(), RelationshipType::Contains);
        assert_eq!(rel.from_id(), "conv");
        assert_eq!(rel.to_id(), "conv_seg_0");
        assert_eq!(rel.to_storage_properties()["position"], 0);
        assert_eq!(
            rel.relationship_type().endpoints(),
            (NodeType::Conversation, NodeType::Segment)
        );
    }

    #[test]
    fn test_relationship_type_names() {
        let names: Vec<&str> = RelationshipType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, ["SPEAKS_IN", "DISCUSSES", "MENTIONS", "FOLLOWS", "CONTAINS"]);
    }
}
