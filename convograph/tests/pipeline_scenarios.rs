//! End-to-end runs of the job pipeline over in-memory graph storage.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use convograph::errors::ConvographError;
use convograph::extraction::{ExtractionPlan, Extractor, KeywordExtractor, LlmExtractor};
use convograph::graph_store::GraphStore;
use convograph::identity;
use convograph::jobs::{InMemoryJobStore, JobRunner, JobStatus};
use convograph::nodes::NodeType;
use convograph::pipeline::format::FormatOptions;
use convograph::pipeline::{FormattedResult, Pipeline, PipelineServices, ResultFormatter};
use convograph::transcript::TranscriptionResult;
use helpers::{memory_manager, phone_request, processor, SlowProvider};

fn runner(services: PipelineServices) -> JobRunner {
    JobRunner::new(services, Arc::new(InMemoryJobStore::new()), None)
}

#[tokio::test]
async fn test_phone_call_builds_and_persists_graph() {
    let manager = memory_manager(true).await;
    let services = PipelineServices {
        graph: Some(processor(&manager, ExtractionPlan::keyword_only())),
        ..PipelineServices::basic()
    };

    let record = runner(services).run(phone_request("call-1")).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let result = record.result.unwrap();
    let report = &result["metadata"]["graph_processing"];
    assert_eq!(report["success"], true);
    assert_eq!(report["conversation_id"], "call-1");

    let store = GraphStore::new(manager.clone(), 100);
    assert_eq!(store.count_nodes("Conversation").await, 1);
    assert_eq!(store.count_nodes("Speaker").await, 2);
    assert_eq!(store.count_nodes("Entity").await, 1);
    assert_eq!(store.count_relationships("FOLLOWS").await, 1);

    let phone = store
        .node(NodeType::Entity, &identity::entity_id("PHONE", "555-111-2222"))
        .await
        .expect("phone entity stored");
    assert_eq!(phone["text"], "555-111-2222");

    let s1 = store
        .node(NodeType::Speaker, &identity::speaker_id("call-1", "s1"))
        .await
        .expect("speaker stored");
    let ratio = s1["participation_ratio"].as_f64().unwrap();
    assert!((ratio - 0.556).abs() < 1e-3);
}

struct ExplodingFormatter;

impl ResultFormatter for ExplodingFormatter {
    fn format(&self, _: &TranscriptionResult, _: &FormatOptions) -> convograph::Result<FormattedResult> {
        Err(ConvographError::Validation("template missing".to_string()))
    }
}

#[tokio::test]
async fn test_format_failure_fails_job_without_graph() {
    let manager = memory_manager(true).await;
    let services = PipelineServices {
        formatter: Arc::new(ExplodingFormatter),
        graph: Some(processor(&manager, ExtractionPlan::keyword_only())),
        ..PipelineServices::basic()
    };

    let record = runner(services).run(phone_request("call-2")).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(!record.error.unwrap_or_default().is_empty());

    let store = GraphStore::new(manager, 100);
    assert_eq!(store.count_nodes("Conversation").await, 0);
}

#[tokio::test]
async fn test_storage_outage_does_not_fail_job() {
    let manager = memory_manager(false).await;
    let services = PipelineServices {
        graph: Some(processor(&manager, ExtractionPlan::keyword_only())),
        ..PipelineServices::basic()
    };

    let record = runner(services).run(phone_request("call-3")).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let report = &record.result.unwrap()["metadata"]["graph_processing"];
    assert_eq!(report["success"], false);
    assert!(report["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test(start_paused = true)]
async fn test_llm_timeout_yields_no_entities_but_succeeds() {
    let manager = memory_manager(true).await;
    let llm: Arc<dyn Extractor> = Arc::new(LlmExtractor::new(
        Arc::new(SlowProvider {
            delay: Duration::from_secs(120),
        }),
        500,
        Duration::from_secs(30),
    ));
    let keyword: Arc<dyn Extractor> = Arc::new(KeywordExtractor::default());
    let services = PipelineServices {
        graph: Some(processor(&manager, ExtractionPlan::new(keyword, llm))),
        ..PipelineServices::basic()
    };

    let record = runner(services).run(phone_request("call-4")).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    let report = &record.result.unwrap()["metadata"]["graph_processing"];
    assert_eq!(report["success"], true);

    let store = GraphStore::new(manager, 100);
    assert_eq!(store.count_nodes("Entity").await, 0);
    assert_eq!(store.count_nodes("Segment").await, 2);
}

#[tokio::test]
async fn test_reprocessing_converges() {
    let manager = memory_manager(true).await;
    let services = PipelineServices {
        graph: Some(processor(&manager, ExtractionPlan::keyword_only())),
        ..PipelineServices::basic()
    };
    let pipeline = Pipeline::for_request(&services, &phone_request("call-5")).unwrap();
    let store = GraphStore::new(manager, 100);

    pipeline.run(phone_request("call-5")).await;
    let first = store.database_stats().await;
    pipeline.run(phone_request("call-5")).await;
    let second = store.database_stats().await;

    assert!(first.total_nodes() > 0);
    assert_eq!(first, second);
}
