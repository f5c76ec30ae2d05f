//! Text-completion providers.
//!
//! The pipeline only needs `{prompt, max_tokens} -> text`; prompt construction and
//! response parsing belong to the callers (extraction, summarization, translation).
//!
//! # Implementations
//! - [`openai::OpenAiClient`]: OpenAI and OpenRouter chat completions via `async-openai`.
//! - [`anthropic::AnthropicClient`]: Anthropic Messages API via `reqwest`.
//! - [`local::LocalClient`]: self-hosted `/v1/completions` endpoint via `reqwest`.

pub mod anthropic;
pub mod local;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{LlmProviderKind, LlmSettings};
use crate::errors::{ConvographError, LlmError, Result};

pub use anthropic::AnthropicClient;
pub use local::LocalClient;
pub use openai::{CacheConfig, OpenAiClient};

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    /// Optional system instruction; providers without a system slot prepend it.
    pub system: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Narrow completion capability injected into every LLM-backed component.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Build the configured provider.
///
/// Fails with [`ConvographError::Configuration`] when a hosted provider has no
/// API key, so a missing credential surfaces at startup.
pub fn from_settings(settings: &LlmSettings) -> Result<Arc<dyn CompletionProvider>> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let api_base = settings.resolved_api_base();
    let api_key = settings
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty());

    let provider: Arc<dyn CompletionProvider> = match settings.provider {
        LlmProviderKind::Local => Arc::new(
            LocalClient::new(api_base, settings.model.clone(), timeout)?
                .with_temperature(settings.temperature),
        ),
        kind => {
            let api_key = api_key.ok_or_else(|| {
                ConvographError::Configuration(format!(
                    "no API key configured for LLM provider {kind}; set GRAPH_LLM_API_KEY"
                ))
            })?;
            match kind {
                LlmProviderKind::Anthropic => {
                    let client =
                        AnthropicClient::new(api_key, settings.model.clone(), api_base, timeout)?
                            .with_temperature(settings.temperature);
                    Arc::new(client) as Arc<dyn CompletionProvider>
                }
                _ => {
                    let client =
                        OpenAiClient::new(api_key, settings.model.clone(), CacheConfig::default())
                            .with_api_base(&api_base)
                            .with_name(kind.to_string())
                            .with_temperature(settings.temperature)
                            .with_retry_budget(timeout);
                    Arc::new(client) as Arc<dyn CompletionProvider>
                }
            }
        }
    };

    info!(
        provider = %settings.provider,
        model = %settings.model,
        "completion provider initialised"
    );
    Ok(provider)
}

/// Map a non-success HTTP status and its body to an [`LlmError`].
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::Authentication,
        429 => LlmError::RateLimit,
        code => LlmError::Api {
            status: code,
            message: crate::utils::truncate_with_ellipsis(body, 300),
        },
    }
}

/// Shared `reqwest` client with the provider timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConvographError::Configuration(format!("failed to build HTTP client: {e}")))
}
