//! Build-and-persist for one conversation.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::builder::{ConversationInput, GraphModelBuilder};
use crate::errors::Result;
use crate::graph_store::{persist_error, GraphStore};
use crate::pipeline::GraphStage;

/// Statistics of one successful graph run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRunStats {
    pub conversation_id: String,
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub processing_time_seconds: f64,
}

/// Outcome recorded under `metadata.graph_processing`:
/// `{success: true, nodes_created, ...}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphProcessingReport {
    pub success: bool,
    #[serde(flatten)]
    pub stats: Option<GraphRunStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphProcessingReport {
    pub fn succeeded(stats: GraphRunStats) -> Self {
        Self {
            success: true,
            stats: Some(stats),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            stats: None,
            error: Some(error.into()),
        }
    }
}

impl From<Result<GraphRunStats>> for GraphProcessingReport {
    fn from(result: Result<GraphRunStats>) -> Self {
        match result {
            Ok(stats) => Self::succeeded(stats),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Builds the graph model of a conversation and writes it to the store.
#[derive(Clone)]
pub struct ConversationGraphProcessor {
    builder: GraphModelBuilder,
    store: GraphStore,
}

impl ConversationGraphProcessor {
    pub fn new(builder: GraphModelBuilder, store: GraphStore) -> Self {
        Self { builder, store }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub async fn try_process(&self, input: &ConversationInput) -> Result<GraphRunStats> {
        let started = Instant::now();
        let model = self.builder.build(input).await?;
        let counts = self.store.persist(&model).await.map_err(persist_error)?;

        let stats = GraphRunStats {
            conversation_id: input.conversation_id.clone(),
            nodes_created: counts.nodes_created,
            relationships_created: counts.relationships_created,
            processing_time_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            conversation_id = %stats.conversation_id,
            nodes = stats.nodes_created,
            relationships = stats.relationships_created,
            elapsed_secs = stats.processing_time_seconds,
            "conversation graph persisted"
        );
        Ok(stats)
    }

    /// Like [`Self::try_process`] but never fails; errors land in the report.
    pub async fn process(&self, input: &ConversationInput) -> GraphProcessingReport {
        let result = self.try_process(input).await;
        if let Err(e) = &result {
            error!(conversation_id = %input.conversation_id, error = %e, "graph processing failed");
        }
        result.into()
    }
}

#[async_trait]
impl GraphStage for ConversationGraphProcessor {
    async fn build_graph(&self, input: &ConversationInput) -> Result<GraphRunStats> {
        self.try_process(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{GraphDatabaseManager, MemoryDriver};
    use crate::transcript::Segment;
    use serde_json::json;
    use std::sync::Arc;

    fn input() -> ConversationInput {
        ConversationInput {
            conversation_id: "conv".to_string(),
            audio_file_id: "audio".to_string(),
            language: "en".to_string(),
            duration: None,
            segments: vec![Segment::new(0.0, 1.0, "hello", "a")],
        }
    }

    fn processor(manager: GraphDatabaseManager) -> ConversationGraphProcessor {
        ConversationGraphProcessor::new(
            GraphModelBuilder::default(),
            GraphStore::new(Arc::new(manager), 100),
        )
    }

    #[tokio::test]
    async fn test_process_reports_success() {
        let manager = GraphDatabaseManager::with_driver(Arc::new(MemoryDriver::new()), true);
        manager.initialize().await.unwrap();
        let report = processor(manager).process(&input()).await;
        assert!(report.success);
        let stats = report.stats.unwrap();
        // conversation + speaker + segment; SPEAKS_IN + CONTAINS
        assert_eq!(stats.nodes_created, 3);
        assert_eq!(stats.relationships_created, 2);
    }

    #[tokio::test]
    async fn test_storage_unavailable_is_reported_not_raised() {
        let manager = GraphDatabaseManager::with_driver(Arc::new(MemoryDriver::new()), false);
        let report = processor(manager).process(&input()).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("unavailable"));
    }

    #[test]
    fn test_report_shape() {
        let ok = serde_json::to_value(GraphProcessingReport::succeeded(GraphRunStats {
            conversation_id: "c".to_string(),
            nodes_created: 1,
            relationships_created: 0,
            processing_time_seconds: 0.5,
        }))
        .unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["nodes_created"], 1);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(GraphProcessingReport::failed("boom")).unwrap();
        assert_eq!(failed, json!({"success": false, "error": "boom"}));
    }
}
