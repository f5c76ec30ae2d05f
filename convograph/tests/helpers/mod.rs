#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convograph::builder::GraphModelBuilder;
use convograph::driver::{GraphDatabaseManager, MemoryDriver};
use convograph::extraction::ExtractionPlan;
use convograph::graph_store::GraphStore;
use convograph::jobs::JobRequest;
use convograph::llm_client::{CompletionProvider, CompletionRequest};
use convograph::pipeline::GraphStage;
use convograph::processor::ConversationGraphProcessor;
use serde_json::json;

/// Enabled in-memory storage; connected unless `connect` is false.
pub async fn memory_manager(connect: bool) -> Arc<GraphDatabaseManager> {
    let manager = GraphDatabaseManager::with_driver(Arc::new(MemoryDriver::new()), true);
    if connect {
        manager.initialize().await.expect("memory driver connects");
    }
    Arc::new(manager)
}

pub fn processor(
    manager: &Arc<GraphDatabaseManager>,
    plan: ExtractionPlan,
) -> Arc<dyn GraphStage> {
    Arc::new(ConversationGraphProcessor::new(
        GraphModelBuilder::new(plan),
        GraphStore::new(manager.clone(), 100),
    ))
}

/// Two speakers, one phone number, nine seconds.
pub fn phone_request(request_id: &str) -> JobRequest {
    let mut request = JobRequest::new(request_id);
    request.engine_output = json!({
        "segments": [
            {"start": 0.0, "end": 5.0, "text": "Call me at 555-111-2222", "speaker": "s1"},
            {"start": 5.0, "end": 9.0, "text": "Sure, I will", "speaker": "s2"}
        ],
        "language": "en",
        "duration": 9.0
    });
    request
}

/// Completion provider that answers only after `delay`.
pub struct SlowProvider {
    pub delay: Duration,
}

#[async_trait]
impl CompletionProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: &CompletionRequest) -> convograph::Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(r#"{"entities": [{"text": "Acme", "type": "ORG"}]}"#.to_string())
    }
}
