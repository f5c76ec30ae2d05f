//! Topic and entity extraction strategies.
//!
//! Every strategy implements [`Extractor`]. The graph builder talks to an
//! [`ExtractionPlan`], which holds the strategy chosen for topics and the one
//! chosen for entities and turns any strategy error into zero extractions. A plan
//! may also carry a [`SentimentAnalyzer`]; its failures leave a segment without
//! sentiment.

pub mod hybrid;
pub mod keyword;
pub mod llm;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{EntityMethod, ExtractionSettings, TopicMethod};
use crate::errors::{ConvographError, Result};

pub use hybrid::HybridExtractor;
pub use keyword::KeywordExtractor;
pub use llm::LlmExtractor;

/// A topic found in a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCandidate {
    pub name: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub keywords: Vec<String>,
}

/// An entity found in a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub text: String,
    /// Uppercase kind (`PHONE`, `EMAIL`, `PERSON`, ...).
    pub entity_type: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

/// Per-segment sentiment as reported by an analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSentiment {
    /// `positive`, `negative` or `neutral`.
    pub label: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub emotions: Vec<String>,
    /// In `[0, 1]`.
    pub intensity: f64,
}

/// Common capability of all extraction strategies.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    async fn extract_topics(&self, text: &str) -> Result<Vec<TopicCandidate>>;

    async fn extract_entities(&self, text: &str) -> Result<Vec<EntityCandidate>>;
}

#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the text carries no usable sentiment.
    async fn analyze_sentiment(&self, text: &str) -> Result<Option<SegmentSentiment>>;
}

/// The strategies in effect for one engine instance. Read-only after construction.
#[derive(Clone)]
pub struct ExtractionPlan {
    topics: Arc<dyn Extractor>,
    entities: Arc<dyn Extractor>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
}

impl ExtractionPlan {
    pub fn new(topics: Arc<dyn Extractor>, entities: Arc<dyn Extractor>) -> Self {
        Self {
            topics,
            entities,
            sentiment: None,
        }
    }

    /// Also analyze the sentiment of every segment.
    pub fn with_sentiment(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    /// Keyword tables and regex family only. Offline and deterministic.
    pub fn keyword_only() -> Self {
        let keyword: Arc<dyn Extractor> = Arc::new(KeywordExtractor::default());
        Self::new(keyword.clone(), keyword)
    }

    /// Resolve the configured methods.
    ///
    /// `llm` must be present when either method is LLM-based or hybrid, or when
    /// sentiment analysis is enabled; otherwise this fails with
    /// [`ConvographError::Configuration`].
    pub fn from_settings(settings: &ExtractionSettings, llm: Option<LlmExtractor>) -> Result<Self> {
        let keyword: Arc<dyn Extractor> = Arc::new(KeywordExtractor::from_settings(settings)?);
        let llm: Option<Arc<LlmExtractor>> = llm.map(Arc::new);

        let require_llm = |what: &str| {
            llm.clone().ok_or_else(|| {
                ConvographError::Configuration(format!(
                    "{what} extraction needs a completion provider but none is configured"
                ))
            })
        };

        let topics: Arc<dyn Extractor> = match settings.topic_method {
            TopicMethod::KeywordMatching => keyword.clone(),
            TopicMethod::LlmBased => require_llm("topic")? as Arc<dyn Extractor>,
            TopicMethod::Hybrid => Arc::new(HybridExtractor::new(vec![
                keyword.clone(),
                require_llm("topic")? as Arc<dyn Extractor>,
            ])),
        };

        let entities: Arc<dyn Extractor> = match settings.entity_method {
            EntityMethod::RegexPatterns => keyword.clone(),
            EntityMethod::LlmBased => require_llm("entity")? as Arc<dyn Extractor>,
            EntityMethod::Hybrid => Arc::new(HybridExtractor::new(vec![
                keyword.clone(),
                require_llm("entity")? as Arc<dyn Extractor>,
            ])),
        };

        let plan = Self::new(topics, entities);
        if settings.sentiment_enabled {
            return Ok(plan.with_sentiment(require_llm("sentiment")?));
        }
        Ok(plan)
    }

    /// Topics in `text`; a failing strategy yields none.
    pub async fn topics(&self, text: &str) -> Vec<TopicCandidate> {
        match self.topics.extract_topics(text).await {
            Ok(found) => found,
            Err(e) => {
                warn!(strategy = self.topics.name(), error = %e, "topic extraction failed");
                Vec::new()
            }
        }
    }

    /// Entities in `text`; a failing strategy yields none.
    pub async fn entities(&self, text: &str) -> Vec<EntityCandidate> {
        match self.entities.extract_entities(text).await {
            Ok(found) => found,
            Err(e) => {
                warn!(strategy = self.entities.name(), error = %e, "entity extraction failed");
                Vec::new()
            }
        }
    }

    /// Sentiment of `text`; `None` when disabled or when the analyzer fails.
    pub async fn sentiment(&self, text: &str) -> Option<SegmentSentiment> {
        let analyzer = self.sentiment.as_ref()?;
        match analyzer.analyze_sentiment(text).await {
            Ok(found) => found,
            Err(e) => {
                warn!(analyzer = analyzer.name(), error = %e, "sentiment analysis failed");
                None
            }
        }
    }

    pub fn topic_strategy(&self) -> &str {
        self.topics.name()
    }

    pub fn entity_strategy(&self) -> &str {
        self.entities.name()
    }
}

impl Default for ExtractionPlan {
    fn default() -> Self {
        Self::keyword_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{CompletionProvider, CompletionRequest};
    use std::time::Duration;

    struct Failing;

    #[async_trait]
    impl Extractor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract_topics(&self, _text: &str) -> Result<Vec<TopicCandidate>> {
            Err(ConvographError::Extraction("boom".to_string()))
        }

        async fn extract_entities(&self, _text: &str) -> Result<Vec<EntityCandidate>> {
            Err(ConvographError::Extraction("boom".to_string()))
        }
    }

    struct Canned;

    #[async_trait]
    impl CompletionProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    #[tokio::test]
    async fn test_plan_swallows_strategy_errors() {
        let failing: Arc<dyn Extractor> = Arc::new(Failing);
        let plan = ExtractionPlan::new(failing.clone(), failing);
        assert!(plan.topics("anything").await.is_empty());
        assert!(plan.entities("anything").await.is_empty());
    }

    #[test]
    fn test_llm_method_without_provider_is_configuration_error() {
        let settings = ExtractionSettings {
            entity_method: EntityMethod::LlmBased,
            ..ExtractionSettings::default()
        };
        let err = ExtractionPlan::from_settings(&settings, None)
            .err()
            .expect("must fail");
        assert!(matches!(err, ConvographError::Configuration(_)));
    }

    #[test]
    fn test_sentiment_without_provider_is_configuration_error() {
        let settings = ExtractionSettings {
            sentiment_enabled: true,
            ..ExtractionSettings::default()
        };
        assert!(ExtractionPlan::from_settings(&settings, None).is_err());
    }

    #[tokio::test]
    async fn test_sentiment_is_absent_unless_enabled() {
        let plan = ExtractionPlan::keyword_only();
        assert!(plan.sentiment("what a great day").await.is_none());
    }

    #[test]
    fn test_hybrid_plan_names() {
        let settings = ExtractionSettings {
            topic_method: TopicMethod::Hybrid,
            entity_method: EntityMethod::LlmBased,
            ..ExtractionSettings::default()
        };
        let llm = LlmExtractor::new(Arc::new(Canned), 100, Duration::from_secs(1));
        let plan = ExtractionPlan::from_settings(&settings, Some(llm)).expect("plan builds");
        assert_eq!(plan.topic_strategy(), "hybrid");
        assert_eq!(plan.entity_strategy(), "llm");
    }
}
