//! Hybrid extraction: the union of several strategies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::Result;

use super::{EntityCandidate, Extractor, TopicCandidate};

/// Concatenates the outputs of its strategies in order. Overlapping results are
/// left in place; they collapse when the builder resolves them to node IDs.
pub struct HybridExtractor {
    strategies: Vec<Arc<dyn Extractor>>,
}

impl HybridExtractor {
    pub fn new(strategies: Vec<Arc<dyn Extractor>>) -> Self {
        Self { strategies }
    }
}

#[async_trait]
impl Extractor for HybridExtractor {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn extract_topics(&self, text: &str) -> Result<Vec<TopicCandidate>> {
        let mut all = Vec::new();
        for strategy in &self.strategies {
            match strategy.extract_topics(text).await {
                Ok(found) => all.extend(found),
                Err(e) => warn!(strategy = strategy.name(), error = %e, "topic strategy failed"),
            }
        }
        Ok(all)
    }

    async fn extract_entities(&self, text: &str) -> Result<Vec<EntityCandidate>> {
        let mut all = Vec::new();
        for strategy in &self.strategies {
            match strategy.extract_entities(text).await {
                Ok(found) => all.extend(found),
                Err(e) => warn!(strategy = strategy.name(), error = %e, "entity strategy failed"),
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConvographError;
    use crate::extraction::KeywordExtractor;

    struct Fixed;

    #[async_trait]
    impl Extractor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract_topics(&self, _text: &str) -> Result<Vec<TopicCandidate>> {
            Ok(vec![TopicCandidate {
                name: "Business".to_string(),
                confidence: 0.9,
                keywords: vec![],
            }])
        }

        async fn extract_entities(&self, _text: &str) -> Result<Vec<EntityCandidate>> {
            Err(ConvographError::Extraction("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_union_keeps_both_outputs() {
        let hybrid = HybridExtractor::new(vec![
            Arc::new(KeywordExtractor::default()),
            Arc::new(Fixed),
        ]);

        let topics = hybrid.extract_topics("our budget is tight").await.unwrap();
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["business", "Business"]);

        // The failing strategy drops out; the regex strategy still reports.
        let entities = hybrid.extract_entities("call 555-111-2222").await.unwrap();
        assert_eq!(entities.len(), 1);
    }
}
