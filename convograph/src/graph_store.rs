//! Persisting graph models and reading them back.
//!
//! Writes go out in chunks of `write_batch_size` statements, nodes strictly
//! before relationships so every relationship finds both endpoints. Counts are
//! taken from the rows the backend returns, not from the model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::builder::GraphModel;
use crate::driver::{statements, GraphDatabaseManager, Statement};
use crate::edges::RelationshipType;
use crate::errors::{ConvographError, Result};
use crate::nodes::NodeType;
use crate::types::{row_count, Properties};
use crate::utils::storage_now;

/// What one [`GraphStore::persist`] call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistCounts {
    pub nodes_created: u64,
    pub relationships_created: u64,
}

/// Node and relationship totals per label/type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub nodes: Vec<(String, u64)>,
    pub relationships: Vec<(String, u64)>,
}

impl DatabaseStats {
    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|(_, n)| n).sum()
    }

    pub fn total_relationships(&self) -> u64 {
        self.relationships.iter().map(|(_, n)| n).sum()
    }
}

/// Summary of one stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOverview {
    pub id: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: u64,
    #[serde(default)]
    pub speakers: u64,
    #[serde(default)]
    pub topics: Option<u64>,
    #[serde(default)]
    pub entities: Option<u64>,
}

#[derive(Clone)]
pub struct GraphStore {
    manager: Arc<GraphDatabaseManager>,
    batch_size: usize,
}

impl GraphStore {
    pub fn new(manager: Arc<GraphDatabaseManager>, batch_size: usize) -> Self {
        Self {
            manager,
            batch_size: batch_size.max(1),
        }
    }

    pub fn manager(&self) -> &Arc<GraphDatabaseManager> {
        &self.manager
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Upsert every node, then every relationship, of `model`.
    pub async fn persist(&self, model: &GraphModel) -> Result<PersistCounts> {
        let dialect = self.manager.dialect();
        let now = storage_now();

        let nodes: Vec<Statement> = model
            .nodes()
            .iter()
            .map(|node| statements::merge_node(dialect, node, &now))
            .collect();
        let relationships: Vec<Statement> = model
            .relationships
            .iter()
            .map(|rel| statements::merge_relationship(dialect, rel, &now))
            .collect();

        let nodes_created = self.write_chunks(&nodes).await?;
        let relationships_created = self.write_chunks(&relationships).await?;

        if (relationships_created as usize) < relationships.len() {
            debug!(
                expected = relationships.len(),
                written = relationships_created,
                "some relationships found no endpoints"
            );
        }
        Ok(PersistCounts {
            nodes_created,
            relationships_created,
        })
    }

    async fn write_chunks(&self, all: &[Statement]) -> Result<u64> {
        let mut written = 0u64;
        for chunk in all.chunks(self.batch_size) {
            let rows = self.manager.execute_batch(chunk).await?;
            written += rows.len() as u64;
        }
        Ok(written)
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub async fn count_nodes(&self, label: &str) -> u64 {
        let st = statements::count_nodes(self.manager.dialect(), label, None);
        self.first_count(&st).await
    }

    pub async fn count_relationships(&self, rel_type: &str) -> u64 {
        let st = statements::count_relationships(self.manager.dialect(), rel_type, None);
        self.first_count(&st).await
    }

    pub async fn database_stats(&self) -> DatabaseStats {
        let mut stats = DatabaseStats::default();
        for node_type in NodeType::ALL {
            let label = node_type.label();
            stats
                .nodes
                .push((label.to_string(), self.count_nodes(label).await));
        }
        for rel_type in RelationshipType::ALL {
            let name = rel_type.as_str();
            stats
                .relationships
                .push((name.to_string(), self.count_relationships(name).await));
        }
        stats
    }

    pub async fn conversation_overview(&self, conversation_id: &str) -> Option<ConversationOverview> {
        let st = statements::conversation_overview(self.manager.dialect(), conversation_id);
        let row = self.manager.execute_read(&st).await.into_iter().next()?;
        serde_json::from_value(Value::Object(row)).ok()
    }

    /// Stored properties of one node of the conversation graph.
    pub async fn node(&self, node_type: NodeType, id: &str) -> Option<Properties> {
        let st = statements::node_by_id(self.manager.dialect(), node_type, id);
        let mut row = self.manager.execute_read(&st).await.into_iter().next()?;
        match row.remove("node") {
            Some(Value::Object(props)) => Some(props),
            _ => None,
        }
    }

    async fn first_count(&self, st: &Statement) -> u64 {
        self.manager
            .execute_read(st)
            .await
            .first()
            .map(|row| row_count(row, "count"))
            .unwrap_or(0)
    }
}

/// Map storage errors raised while persisting into the graph stage's error.
pub(crate) fn persist_error(err: ConvographError) -> ConvographError {
    match err {
        e @ ConvographError::StorageUnavailable(_) => e,
        other => ConvographError::Storage(format!("failed to persist graph: {other}")),
    }
}
