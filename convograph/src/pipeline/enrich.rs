//! Optional enrichment services backed by the completion provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{ConvographError, LlmError, Result};
use crate::llm_client::{CompletionProvider, CompletionRequest};
use crate::prompts;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<String>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Summaries and translations through one completion provider, each call
/// bounded by `timeout`.
#[derive(Clone)]
pub struct CompletionEnricher {
    provider: Arc<dyn CompletionProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl CompletionEnricher {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            provider,
            max_tokens,
            timeout,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = CompletionRequest::new(prompt, self.max_tokens);
        let reply = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ConvographError::Llm(LlmError::EmptyResponse));
        }
        Ok(reply.to_string())
    }
}

#[async_trait]
impl Summarizer for CompletionEnricher {
    async fn summarize(&self, transcript: &str) -> Result<String> {
        if transcript.trim().is_empty() {
            return Ok(String::new());
        }
        self.complete(prompts::summarization(transcript)).await
    }
}

#[async_trait]
impl Translator for CompletionEnricher {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        self.complete(prompts::translation(text, target_language)).await
    }
}
