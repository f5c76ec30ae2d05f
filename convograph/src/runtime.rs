//! Process-wide wiring: one storage manager, one pipeline service set, one job
//! runner and one bulk loader, all built from [`Settings`] at startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::builder::GraphModelBuilder;
use crate::config::Settings;
use crate::driver::GraphDatabaseManager;
use crate::errors::Result;
use crate::extraction::{ExtractionPlan, LlmExtractor};
use crate::graph_store::GraphStore;
use crate::jobs::{InMemoryJobStore, JobRunner, JobStore};
use crate::llm_client::{self, CompletionProvider};
use crate::loader::BatchLoader;
use crate::notifier::{Notifier, WebhookNotifier};
use crate::pipeline::{CompletionEnricher, GraphStage, PipelineServices, Summarizer, Translator};
use crate::processor::ConversationGraphProcessor;

pub struct Runtime {
    settings: Settings,
    manager: Arc<GraphDatabaseManager>,
    store: GraphStore,
    runner: JobRunner,
    loader: BatchLoader,
}

impl Runtime {
    /// Build everything. Nothing connects yet; call [`Runtime::initialize`].
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let manager = Arc::new(GraphDatabaseManager::from_settings(
            &settings.database,
            settings.graph_enabled,
        )?);
        Self::with_manager(settings, manager, Arc::new(InMemoryJobStore::new()))
    }

    /// Like [`Runtime::from_settings`] with an explicit manager and job store.
    pub fn with_manager(
        settings: Settings,
        manager: Arc<GraphDatabaseManager>,
        jobs: Arc<dyn JobStore>,
    ) -> Result<Self> {
        let provider: Option<Arc<dyn CompletionProvider>> =
            if settings.needs_completion_provider() {
                Some(llm_client::from_settings(&settings.llm)?)
            } else {
                None
            };
        let max_tokens = settings.llm.max_tokens;
        let timeout = Duration::from_secs(settings.llm.timeout_secs);

        let llm_extractor = match (&provider, settings.extraction.uses_llm()) {
            (Some(p), true) => Some(LlmExtractor::new(p.clone(), max_tokens, timeout)),
            _ => None,
        };
        let plan = ExtractionPlan::from_settings(&settings.extraction, llm_extractor)?;

        let store = GraphStore::new(manager.clone(), settings.database.write_batch_size);
        let graph: Option<Arc<dyn GraphStage>> = settings.graph_enabled.then(|| {
            Arc::new(ConversationGraphProcessor::new(
                GraphModelBuilder::new(plan),
                store.clone(),
            )) as Arc<dyn GraphStage>
        });

        let enricher = provider
            .as_ref()
            .map(|p| Arc::new(CompletionEnricher::new(p.clone(), max_tokens, timeout)));

        let mut services = PipelineServices::basic();
        services.graph = graph;
        if settings.summarization_enabled {
            services.summarizer = enricher.clone().map(|e| e as Arc<dyn Summarizer>);
        }
        if settings.translation_enabled {
            services.translator = enricher.map(|e| e as Arc<dyn Translator>);
        }

        let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(Duration::from_secs(
            settings.callback_timeout_secs,
        ))?);
        let runner = JobRunner::new(services, jobs, Some(notifier));
        let loader = BatchLoader::new(manager.clone(), &settings.loader);

        Ok(Self {
            settings,
            manager,
            store,
            runner,
            loader,
        })
    }

    pub async fn initialize(&self) -> Result<()> {
        self.manager.initialize().await?;
        info!(
            graph_enabled = self.settings.graph_enabled,
            summarization = self.settings.summarization_enabled,
            translation = self.settings.translation_enabled,
            "runtime ready"
        );
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.manager.shutdown().await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn manager(&self) -> &Arc<GraphDatabaseManager> {
        &self.manager
    }

    pub fn graph_store(&self) -> &GraphStore {
        &self.store
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn loader(&self) -> &BatchLoader {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphBackend;
    use crate::jobs::{JobRequest, JobStatus};
    use serde_json::json;

    fn memory_settings(graph_enabled: bool) -> Settings {
        let mut settings = Settings {
            graph_enabled,
            ..Settings::default()
        };
        settings.database.backend = GraphBackend::Memory;
        settings
    }

    #[tokio::test]
    async fn test_graph_enabled_runtime_persists_conversation() {
        let runtime = Runtime::from_settings(memory_settings(true)).unwrap();
        runtime.initialize().await.unwrap();

        let mut request = JobRequest::new("conv-1");
        request.engine_output = json!({
            "segments": [{"start": 0.0, "end": 2.0, "text": "Let's talk about the budget", "speaker": "A"}],
            "duration": 2.0
        });
        let record = runtime.runner().run(request).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);

        let overview = runtime
            .graph_store()
            .conversation_overview("conv-1")
            .await
            .expect("conversation stored");
        assert_eq!(overview.segments, 1);
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_graph_skips_stage() {
        let runtime = Runtime::from_settings(memory_settings(false)).unwrap();
        runtime.initialize().await.unwrap();

        let mut request = JobRequest::new("conv-2");
        request.engine_output = json!({
            "segments": [{"start": 0.0, "end": 1.0, "text": "hi", "speaker": "A"}]
        });
        let record = runtime.runner().run(request).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        let result = record.result.unwrap();
        assert!(result["metadata"].get("graph_processing").is_none());
    }

    #[test]
    fn test_llm_extraction_without_key_is_configuration_error() {
        let mut settings = memory_settings(true);
        settings.extraction.topic_method = crate::config::TopicMethod::LlmBased;
        settings.llm.api_key = None;
        assert!(Runtime::from_settings(settings).is_err());
    }
}
