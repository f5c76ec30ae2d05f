//! Processing pipeline.
//!
//! Stages run strictly in order over one [`ProcessingContext`]:
//! 1. **Transcribe**: obtain segments from the speech engine
//! 2. **Format**: build the result document
//! 3. **Summarize**: optional, completion-backed
//! 4. **Translate**: optional, completion-backed
//! 5. **Graph build**: optional, best-effort
//!
//! The first fatal failure is stored in the context and every later fatal stage
//! is skipped. Graph build is never fatal: it runs whenever a formatted result
//! exists and its `Result` is carried in the context, ending up under
//! `metadata.graph_processing`.

pub mod context;
pub mod enrich;
pub mod format;
pub mod speech;
pub mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::builder::ConversationInput;
use crate::errors::{ConvographError, Result};
use crate::jobs::JobRequest;
use crate::processor::GraphRunStats;

pub use context::{PipelineOutcome, ProcessingContext};
pub use enrich::{CompletionEnricher, Summarizer, Translator};
pub use format::{FormattedResult, ResultFormatter, TranscriptFormatter};
pub use speech::{PrecomputedSpeechEngine, SpeechEngine};
pub use stages::{
    FormatStage, GraphBuildStage, Stage, SummarizeStage, TranscribeStage, TranslateStage,
};

/// The graph work done for a finished transcript.
#[async_trait]
pub trait GraphStage: Send + Sync {
    async fn build_graph(&self, input: &ConversationInput) -> Result<GraphRunStats>;
}

/// Long-lived collaborators shared by every run. Built once at startup.
#[derive(Clone)]
pub struct PipelineServices {
    pub speech: Arc<dyn SpeechEngine>,
    pub formatter: Arc<dyn ResultFormatter>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub translator: Option<Arc<dyn Translator>>,
    /// `None` when graph processing is disabled.
    pub graph: Option<Arc<dyn GraphStage>>,
}

impl PipelineServices {
    /// Precomputed speech input and the standard formatter; no optional services.
    pub fn basic() -> Self {
        Self {
            speech: Arc::new(PrecomputedSpeechEngine),
            formatter: Arc::new(TranscriptFormatter),
            summarizer: None,
            translator: None,
            graph: None,
        }
    }
}

/// The stage list for one request.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Assemble the stages `request` asks for.
    ///
    /// Asking for summarization or translation without the matching service is a
    /// [`ConvographError::Configuration`] error, raised before anything runs.
    pub fn for_request(services: &PipelineServices, request: &JobRequest) -> Result<Self> {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(TranscribeStage::new(services.speech.clone())),
            Box::new(FormatStage::new(services.formatter.clone())),
        ];

        if request.summarize {
            let summarizer = services.summarizer.clone().ok_or_else(|| {
                ConvographError::Configuration(
                    "summarization requested but the service is not configured".to_string(),
                )
            })?;
            stages.push(Box::new(SummarizeStage::new(summarizer)));
        }
        if request.translate {
            let translator = services.translator.clone().ok_or_else(|| {
                ConvographError::Configuration(
                    "translation requested but the service is not configured".to_string(),
                )
            })?;
            stages.push(Box::new(TranslateStage::new(translator)));
        }
        if request.enable_graph_processing {
            if let Some(graph) = &services.graph {
                stages.push(Box::new(GraphBuildStage::new(graph.clone())));
            }
        }
        Ok(Self::new(stages))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over a fresh context for `request`.
    pub async fn run(&self, request: JobRequest) -> ProcessingContext {
        let mut ctx = ProcessingContext::new(request);
        for stage in &self.stages {
            if stage.is_fatal() && ctx.is_failed() {
                debug!(request_id = %ctx.request_id(), stage = stage.name(), "skipped after failure");
                continue;
            }
            debug!(request_id = %ctx.request_id(), stage = stage.name(), "stage start");
            if let Err(e) = stage.process(&mut ctx).await {
                error!(request_id = %ctx.request_id(), stage = stage.name(), error = %e, "stage failed");
                if stage.is_fatal() {
                    ctx.error = Some(match e {
                        e @ ConvographError::Input(_) => e,
                        other => ConvographError::Stage {
                            stage: stage.name(),
                            message: other.to_string(),
                        },
                    });
                }
            }
        }
        info!(
            request_id = %ctx.request_id(),
            failed = ctx.is_failed(),
            "pipeline finished"
        );
        ctx
    }
}
