//! OpenAI-compatible chat-completions client.
//!
//! Uses `async-openai` for API calls, `moka` for response caching, and
//! `backoff` for exponential-backoff retry on rate limits / transient errors.
//! OpenRouter speaks the same protocol and reuses this client with its own base URL.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use moka::future::Cache;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::{ConvographError, LlmError, Result};

use super::{CompletionProvider, CompletionRequest};

// ── Cache configuration ───────────────────────────────────────────────────────

/// Configuration for the in-process response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held in memory.
    pub max_capacity: u64,
    /// How long each entry lives before eviction.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            ttl: Duration::from_secs(3_600), // 1 hour
        }
    }
}

// ── Client struct ─────────────────────────────────────────────────────────────

/// OpenAI-compatible client implementing [`CompletionProvider`].
pub struct OpenAiClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    api_key: String,
    name: String,
    model: String,
    temperature: f32,
    /// Total time spent retrying one request before giving up.
    retry_budget: Duration,
    /// Keyed by `md5(model + max_tokens + system + prompt)` → response text.
    cache: Cache<String, String>,
}

impl OpenAiClient {
    /// Create a new client against the default OpenAI endpoint.
    ///
    /// # Arguments
    /// * `api_key` – secret key.
    /// * `model`   – Model name (e.g. `"gpt-3.5-turbo"`).
    /// * `cache_config` – Cache capacity and TTL.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        cache_config: CacheConfig,
    ) -> Self {
        let api_key = api_key.into();
        let config = async_openai::config::OpenAIConfig::new().with_api_key(api_key.clone());
        let client = async_openai::Client::with_config(config);

        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(cache_config.ttl)
            .build();

        Self {
            client,
            api_key,
            name: "openai".to_string(),
            model: model.into(),
            temperature: 0.1,
            retry_budget: Duration::from_secs(30),
            cache,
        }
    }

    /// Point the client at another OpenAI-compatible base URL (OpenRouter, a proxy, a mock).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(self.api_key.clone())
            .with_api_base(api_base);
        self.client = async_openai::Client::with_config(config);
        self
    }

    /// Name reported in logs (default `"openai"`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the sampling temperature (default `0.1`).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the total retry window (default 30 s).
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Compute an MD5 cache key from model + request.
    fn cache_key(&self, request: &CompletionRequest) -> String {
        use md5::{Digest, Md5};
        let mut h = Md5::new();
        h.update(self.model.as_bytes());
        h.update(request.max_tokens.to_le_bytes());
        if let Some(system) = &request.system {
            h.update(b"system");
            h.update(system.as_bytes());
        }
        h.update(b"user");
        h.update(request.prompt.as_bytes());
        format!("{:x}", h.finalize())
    }

    fn messages_json(request: &CompletionRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));
        messages
    }

    /// Call the chat completions endpoint with exponential-backoff retry.
    ///
    /// Retries on [`LlmError::RateLimit`] (HTTP 429) and transient 5xx errors.
    async fn call_with_retry(&self, request: serde_json::Value) -> Result<serde_json::Value> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(self.retry_budget))
            .build();

        backoff::future::retry(backoff, || async {
            let outcome: std::result::Result<serde_json::Value, async_openai::error::OpenAIError> =
                self.client.chat().create_byot(request.clone()).await;

            match outcome {
                Ok(response) => Ok(response),
                Err(e) => {
                    let llm_err = map_openai_error(e);
                    match &llm_err {
                        LlmError::RateLimit => {
                            warn!(provider = %self.name, "rate limit hit, retrying with backoff");
                            Err(backoff::Error::transient(llm_err))
                        }
                        LlmError::Api { status, .. } if *status >= 500 => {
                            warn!(provider = %self.name, status, "transient server error, retrying");
                            Err(backoff::Error::transient(llm_err))
                        }
                        _ => Err(backoff::Error::permanent(llm_err)),
                    }
                }
            }
        })
        .await
        .map_err(ConvographError::Llm)
    }

    /// Extract the assistant message text from a chat-completions response.
    fn extract_content(response: &serde_json::Value) -> Result<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(ToOwned::to_owned)
            .ok_or(ConvographError::Llm(LlmError::EmptyResponse))
    }
}

// ── CompletionProvider implementation ─────────────────────────────────────────

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let key = self.cache_key(request);

        if let Some(cached) = self.cache.get(&key).await {
            debug!(provider = %self.name, "completion cache hit");
            return Ok(cached);
        }

        let body = json!({
            "model": self.model,
            "messages": Self::messages_json(request),
            "temperature": self.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self.call_with_retry(body).await?;
        let content = Self::extract_content(&response)?;

        self.cache.insert(key, content.clone()).await;

        Ok(content)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Map an [`async_openai::error::OpenAIError`] to our [`LlmError`] domain type.
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match err {
        // The API error body carries no HTTP status; classify by its code or type.
        OpenAIError::ApiError(api_err) => {
            let kind = api_err
                .code
                .as_deref()
                .or(api_err.r#type.as_deref())
                .unwrap_or_default();
            match kind {
                "invalid_api_key" | "invalid_authentication" | "authentication_error"
                | "permission_error" => LlmError::Authentication,
                "rate_limit_exceeded" | "rate_limit_error" | "requests" | "tokens" => {
                    LlmError::RateLimit
                }
                _ => LlmError::Api {
                    status: 0,
                    message: api_err.message,
                },
            }
        }
        OpenAIError::Reqwest(e) => LlmError::Transport(e.to_string()),
        other => LlmError::Api {
            status: 0,
            message: other.to_string(),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
