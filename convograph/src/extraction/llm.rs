//! LLM-backed extraction.
//!
//! Builds a prompt, calls the injected [`CompletionProvider`] under a hard timeout
//! and parses JSON out of the reply (an array for extractions, an object for
//! sentiment). Provider errors, timeouts and
//! unparseable replies all end in an empty result and a log line; nothing here
//! returns `Err`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::llm_client::{CompletionProvider, CompletionRequest};
use crate::prompts;
use crate::utils::extract_json_from_response;

use super::{EntityCandidate, Extractor, SegmentSentiment, SentimentAnalyzer, TopicCandidate};

const DEFAULT_TOPIC_CONFIDENCE: f64 = 0.7;
const DEFAULT_ENTITY_CONFIDENCE: f64 = 0.8;
const DEFAULT_SENTIMENT_SCORE: f64 = 0.5;
const SENTIMENT_LABELS: [&str; 3] = ["positive", "negative", "neutral"];

#[derive(Deserialize)]
struct LlmTopic {
    #[serde(alias = "name", alias = "topic")]
    topic_name: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct LlmEntity {
    #[serde(alias = "text")]
    entity_text: String,
    #[serde(alias = "type")]
    entity_type: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct LlmSentiment {
    #[serde(alias = "label")]
    sentiment: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    emotions: Vec<String>,
    #[serde(default)]
    intensity: Option<f64>,
}

pub struct LlmExtractor {
    provider: Arc<dyn CompletionProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            provider,
            max_tokens,
            timeout,
        }
    }

    /// Run one completion; `None` on timeout or provider failure.
    async fn ask(&self, kind: &str, prompt: String) -> Option<String> {
        let request =
            CompletionRequest::new(prompt, self.max_tokens).with_system(prompts::EXTRACTION_SYSTEM);

        match tokio::time::timeout(self.timeout, self.provider.complete(&request)).await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), kind, error = %e, "LLM extraction failed");
                None
            }
            Err(_) => {
                warn!(
                    provider = self.provider.name(),
                    kind,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "LLM extraction timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract_topics(&self, text: &str) -> Result<Vec<TopicCandidate>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let Some(reply) = self.ask("topics", prompts::topic_extraction(text)).await else {
            return Ok(Vec::new());
        };

        let topics: Vec<TopicCandidate> = parse_items::<LlmTopic>(&reply, "topics")
            .into_iter()
            .filter(|t| !t.topic_name.trim().is_empty())
            .map(|t| TopicCandidate {
                name: t.topic_name.trim().to_string(),
                confidence: clamp_confidence(t.confidence, DEFAULT_TOPIC_CONFIDENCE),
                keywords: t.keywords,
            })
            .collect();
        debug!(count = topics.len(), "LLM topics parsed");
        Ok(topics)
    }

    async fn extract_entities(&self, text: &str) -> Result<Vec<EntityCandidate>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let Some(reply) = self.ask("entities", prompts::entity_extraction(text)).await else {
            return Ok(Vec::new());
        };

        let entities: Vec<EntityCandidate> = parse_items::<LlmEntity>(&reply, "entities")
            .into_iter()
            .filter(|e| !e.entity_text.trim().is_empty() && !e.entity_type.trim().is_empty())
            .map(|e| EntityCandidate {
                text: e.entity_text.trim().to_string(),
                entity_type: e.entity_type.trim().to_uppercase(),
                confidence: clamp_confidence(e.confidence, DEFAULT_ENTITY_CONFIDENCE),
            })
            .collect();
        debug!(count = entities.len(), "LLM entities parsed");
        Ok(entities)
    }
}

#[async_trait]
impl SentimentAnalyzer for LlmExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<Option<SegmentSentiment>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let Some(reply) = self.ask("sentiment", prompts::sentiment_analysis(text)).await else {
            return Ok(None);
        };
        let Some(json) = extract_json_from_response(&reply) else {
            warn!(kind = "sentiment", "LLM reply contained no JSON");
            return Ok(None);
        };

        let parsed = match serde_json::from_str::<LlmSentiment>(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(kind = "sentiment", error = %e, "failed to parse LLM reply");
                return Ok(None);
            }
        };
        let label = parsed.sentiment.trim().to_lowercase();
        if !SENTIMENT_LABELS.contains(&label.as_str()) {
            warn!(label = %label, "LLM returned an unknown sentiment label");
            return Ok(None);
        }

        Ok(Some(SegmentSentiment {
            label,
            confidence: clamp_confidence(parsed.confidence, DEFAULT_SENTIMENT_SCORE),
            emotions: parsed
                .emotions
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            intensity: clamp_confidence(parsed.intensity, DEFAULT_SENTIMENT_SCORE),
        }))
    }
}

/// Parse a JSON array out of `reply`, skipping elements that do not fit `T`.
fn parse_items<T: serde::de::DeserializeOwned>(reply: &str, kind: &str) -> Vec<T> {
    let Some(json) = extract_json_from_response(reply) else {
        warn!(kind, "LLM reply contained no JSON");
        return Vec::new();
    };

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Ok(_) => {
            warn!(kind, "LLM reply was JSON but not an array");
            Vec::new()
        }
        Err(e) => {
            warn!(kind, error = %e, "failed to parse LLM reply");
            Vec::new()
        }
    }
}

fn clamp_confidence(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => default,
    }
}
