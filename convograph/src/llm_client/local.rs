//! Client for a self-hosted model exposing `POST /v1/completions`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::{ConvographError, LlmError, Result};

use super::{http_client, status_error, CompletionProvider, CompletionRequest};

pub struct LocalClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    temperature: f32,
}

impl LocalClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.1,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl CompletionProvider for LocalClient {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        // Plain completion endpoints have no system slot.
        let prompt = match &request.system {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        let response = self
            .http
            .post(format!("{}/v1/completions", self.api_base))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "max_tokens": request.max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text).into());
        }

        let body: serde_json::Value = response.json().await.map_err(LlmError::from)?;
        body["choices"][0]["text"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(ToOwned::to_owned)
            .ok_or(ConvographError::Llm(LlmError::EmptyResponse))
    }
}
