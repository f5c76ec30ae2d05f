//! The pipeline stages.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{info, warn};

use crate::builder::ConversationInput;
use crate::errors::{ConvographError, Result};

use super::context::ProcessingContext;
use super::enrich::{Summarizer, Translator};
use super::format::{FormatOptions, ResultFormatter, Summary};
use super::speech::SpeechEngine;
use super::GraphStage;

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a failure of this stage fails the job. Fatal stages are skipped
    /// once an earlier fatal stage failed.
    fn is_fatal(&self) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()>;
}

// ── Transcribe ────────────────────────────────────────────────────────────────

pub struct TranscribeStage {
    engine: Arc<dyn SpeechEngine>,
}

impl TranscribeStage {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Stage for TranscribeStage {
    fn name(&self) -> &'static str {
        "transcribe"
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let transcription = self.engine.transcribe(&ctx.request).await?;
        info!(
            request_id = %ctx.request_id(),
            segments = transcription.segments.len(),
            "transcription ready"
        );
        ctx.transcription = Some(transcription);
        Ok(())
    }
}

// ── Format ────────────────────────────────────────────────────────────────────

pub struct FormatStage {
    formatter: Arc<dyn ResultFormatter>,
}

impl FormatStage {
    pub fn new(formatter: Arc<dyn ResultFormatter>) -> Self {
        Self { formatter }
    }
}

#[async_trait]
impl Stage for FormatStage {
    fn name(&self) -> &'static str {
        "format"
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let Some(transcription) = &ctx.transcription else {
            return Ok(());
        };
        let options = FormatOptions {
            request_id: ctx.request.request_id.clone(),
            model: ctx.request.model.clone(),
            language: ctx.request.language.clone(),
            punctuate: ctx.request.punctuate,
            smart_format: ctx.request.smart_format,
        };
        ctx.formatted = Some(self.formatter.format(transcription, &options)?);
        Ok(())
    }
}

// ── Summarize ─────────────────────────────────────────────────────────────────

pub struct SummarizeStage {
    summarizer: Arc<dyn Summarizer>,
}

impl SummarizeStage {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }
}

#[async_trait]
impl Stage for SummarizeStage {
    fn name(&self) -> &'static str {
        "summarize"
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let Some(formatted) = ctx.formatted.as_mut() else {
            return Ok(());
        };
        let text = self.summarizer.summarize(formatted.transcript()).await?;
        formatted.metadata.summary = Some(Summary {
            text,
            generated_at: chrono::Utc::now().to_rfc3339(),
        });
        Ok(())
    }
}

// ── Translate ─────────────────────────────────────────────────────────────────

pub struct TranslateStage {
    translator: Arc<dyn Translator>,
}

impl TranslateStage {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl Stage for TranslateStage {
    fn name(&self) -> &'static str {
        "translate"
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let Some(target) = ctx
            .request
            .target_language
            .clone()
            .filter(|t| !t.trim().is_empty())
        else {
            warn!(request_id = %ctx.request_id(), "translation requested without a target language; skipping");
            return Ok(());
        };
        let Some(formatted) = ctx.formatted.as_mut() else {
            return Ok(());
        };
        let translated = self
            .translator
            .translate(formatted.transcript(), &target)
            .await?;
        formatted.metadata.translations.insert(target, translated);
        Ok(())
    }
}

// ── Graph build ───────────────────────────────────────────────────────────────

/// Best-effort: runs whenever a formatted result exists and records its outcome
/// in [`ProcessingContext::graph_outcome`] instead of failing the job. Panics
/// are caught and recorded the same way.
pub struct GraphBuildStage {
    graph: Arc<dyn GraphStage>,
}

impl GraphBuildStage {
    pub fn new(graph: Arc<dyn GraphStage>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Stage for GraphBuildStage {
    fn name(&self) -> &'static str {
        "graph_build"
    }

    fn is_fatal(&self) -> bool {
        false
    }

    async fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        if ctx.formatted.is_none() {
            return Ok(());
        }
        let Some(transcription) = &ctx.transcription else {
            return Ok(());
        };

        let input = ConversationInput {
            conversation_id: ctx.request.request_id.clone(),
            audio_file_id: ctx
                .request
                .audio_file_id
                .clone()
                .unwrap_or_else(|| ctx.request.request_id.clone()),
            language: transcription
                .language
                .clone()
                .or_else(|| ctx.request.language.clone())
                .unwrap_or_else(|| "auto".to_string()),
            duration: transcription.duration,
            segments: transcription.segments.clone(),
        };

        let outcome = match AssertUnwindSafe(self.graph.build_graph(&input))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ConvographError::Stage {
                stage: "graph_build",
                message: format!("panicked: {}", panic_message(panic.as_ref())),
            }),
        };

        if let Err(e) = &outcome {
            warn!(request_id = %ctx.request_id(), error = %e, "graph processing failed; job continues");
        }
        ctx.graph_outcome = Some(outcome);
        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
