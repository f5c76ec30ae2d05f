//! ContainsEdge: CONTAINS (Conversation → Segment).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{object, Properties};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainsEdge {
    pub conversation_id: String,
    pub segment_id: String,
    /// Index of the segment in time order.
    pub position: usize,
}

impl ContainsEdge {
    pub fn to_storage_properties(&self) -> Properties {
        object(json!({ "position": self.position }))
    }
}
