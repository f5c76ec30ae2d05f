//! Node types for the conversation graph.
//!
//! One struct per node kind, wrapped in [`GraphNode`] for enum dispatch:
//! - [`ConversationNode`]: one processed conversation
//! - [`SpeakerNode`]: a diarization speaker inside a conversation
//! - [`TopicNode`]: a topic, shared across conversations by normalized name
//! - [`EntityNode`]: an extracted entity, shared by type + normalized text
//! - [`SegmentNode`]: one utterance

pub mod conversation;
pub mod entity;
pub mod segment;
pub mod speaker;
pub mod topic;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Properties;

pub use conversation::ConversationNode;
pub use entity::EntityNode;
pub use segment::SegmentNode;
pub use speaker::SpeakerNode;
pub use topic::TopicNode;

/// Node kind. Doubles as the storage label / collection name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Conversation,
    Speaker,
    Topic,
    Entity,
    Segment,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Conversation,
        NodeType::Speaker,
        NodeType::Topic,
        NodeType::Entity,
        NodeType::Segment,
    ];

    /// Storage label.
    pub fn label(self) -> &'static str {
        match self {
            NodeType::Conversation => "Conversation",
            NodeType::Speaker => "Speaker",
            NodeType::Topic => "Topic",
            NodeType::Entity => "Entity",
            NodeType::Segment => "Segment",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Any node of the conversation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum GraphNode {
    Conversation(ConversationNode),
    Speaker(SpeakerNode),
    Topic(TopicNode),
    Entity(EntityNode),
    Segment(SegmentNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Conversation(n) => &n.id,
            GraphNode::Speaker(n) => &n.id,
            GraphNode::Topic(n) => &n.id,
            GraphNode::Entity(n) => &n.id,
            GraphNode::Segment(n) => &n.id,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            GraphNode::Conversation(_) => NodeType::Conversation,
            GraphNode::Speaker(_) => NodeType::Speaker,
            GraphNode::Topic(_) => NodeType::Topic,
            GraphNode::Entity(_) => NodeType::Entity,
            GraphNode::Segment(_) => NodeType::Segment,
        }
    }

    /// Properties to upsert, including `node_type`.
    pub fn to_storage_properties(&self) -> Properties {
        let mut props = match self {
            GraphNode::Conversation(n) => n.to_storage_properties(),
            GraphNode::Speaker(n) => n.to_storage_properties(),
            GraphNode::Topic(n) => n.to_storage_properties(),
            GraphNode::Entity(n) => n.to_storage_properties(),
            GraphNode::Segment(n) => n.to_storage_properties(),
        };
        props.insert(
            "node_type".to_string(),
            self.node_type().label().to_lowercase().into(),
        );
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_node_dispatch() {
        let node = GraphNode::Topic(TopicNode::new("Meeting", vec![], 0.4));
        assert_eq!(node.node_type(), NodeType::Topic);
        assert!(node.id().starts_with("topic_"));

        let props = node.to_storage_properties();
        assert_eq!(props["node_type"], "topic");
        assert_eq!(props["id"], node.id());
    }

    #[test]
    fn test_graph_node_serde_tag() {
        let node = GraphNode::Entity(EntityNode::new("a@b.com", "EMAIL", 0.8));
        let value = serde_json::to_value(&node).expect("serialize");
        assert_eq!(value["node_type"], "entity");
        let back: GraphNode = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, node);
    }
}
