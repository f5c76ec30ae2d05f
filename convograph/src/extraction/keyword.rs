//! Keyword / pattern extraction. Deterministic, offline, and the default strategy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::config::ExtractionSettings;
use crate::errors::{ConvographError, Result};

use super::{EntityCandidate, Extractor, TopicCandidate};

/// Built-in topic → keywords table.
pub const DEFAULT_TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("business", &["revenue", "profit", "market", "sales", "budget", "finance"]),
    ("meeting", &["agenda", "action", "decision", "follow-up", "deadline", "task"]),
    ("personal", &["family", "vacation", "health", "hobby", "weekend", "personal"]),
    ("project", &["milestone", "deliverable", "timeline", "scope", "requirement"]),
    ("technology", &["ai", "software", "computer", "digital", "tech", "algorithm"]),
];

/// Built-in entity type → regex family.
pub const DEFAULT_ENTITY_PATTERNS: &[(&str, &str)] = &[
    ("date", r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b"),
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("mention", r"@[a-zA-Z0-9_]+"),
    (
        "money",
        r"\$\d+(?:,\d{3})*(?:\.\d{2})?|\b\d+(?:,\d{3})*(?:\.\d{2})?\s*(?:dollars?|USD)\b",
    ),
    ("phone", r"\b\d{3}-\d{3}-\d{4}\b|\(\d{3}\)\s*\d{3}-\d{4}\b"),
    ("time", r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\s*(?:AM|PM))?\b"),
    ("url", r#"https?://[^\s<>"{}|\\^`\[\]]+"#),
];

/// Matches longer than this many characters get the higher confidence tier.
const LONG_MATCH_CHARS: usize = 5;
const LONG_MATCH_CONFIDENCE: f64 = 0.8;
const SHORT_MATCH_CONFIDENCE: f64 = 0.6;

struct TopicRule {
    name: String,
    keywords: Vec<String>,
    matchers: Vec<Regex>,
}

/// Topic keyword tables plus the entity regex family, compiled once.
pub struct KeywordExtractor {
    topics: Vec<TopicRule>,
    patterns: Vec<(String, Regex)>,
}

impl KeywordExtractor {
    /// Compile custom tables. Invalid regexes are a configuration error.
    pub fn new(
        topic_keywords: &BTreeMap<String, Vec<String>>,
        entity_patterns: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut topics = Vec::with_capacity(topic_keywords.len());
        for (name, keywords) in topic_keywords {
            let keywords: Vec<String> = keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if keywords.is_empty() {
                continue;
            }
            let matchers = keywords
                .iter()
                .map(|k| compile(&format!(r"\b{}\b", regex::escape(k)), name))
                .collect::<Result<Vec<_>>>()?;
            topics.push(TopicRule {
                name: name.clone(),
                keywords,
                matchers,
            });
        }

        let patterns = entity_patterns
            .iter()
            .map(|(kind, pattern)| Ok((kind.trim().to_uppercase(), compile(pattern, kind)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { topics, patterns })
    }

    /// Use the configured tables, falling back to the built-in ones.
    pub fn from_settings(settings: &ExtractionSettings) -> Result<Self> {
        let topics = settings
            .topic_keywords
            .clone()
            .unwrap_or_else(default_topic_keywords);
        let patterns = settings
            .entity_patterns
            .clone()
            .unwrap_or_else(default_entity_patterns);
        Self::new(&topics, &patterns)
    }

    fn topics_in(&self, text: &str) -> Vec<TopicCandidate> {
        self.topics
            .iter()
            .filter_map(|rule| {
                let matched = rule.matchers.iter().filter(|re| re.is_match(text)).count();
                (matched > 0).then(|| TopicCandidate {
                    name: rule.name.clone(),
                    confidence: (matched as f64 / rule.keywords.len() as f64).min(1.0),
                    keywords: rule.keywords.clone(),
                })
            })
            .collect()
    }

    fn entities_in(&self, text: &str) -> Vec<EntityCandidate> {
        let mut found = Vec::new();
        for (kind, re) in &self.patterns {
            for m in re.find_iter(text) {
                let matched = m.as_str().trim();
                if matched.is_empty() {
                    continue;
                }
                let confidence = if matched.chars().count() > LONG_MATCH_CHARS {
                    LONG_MATCH_CONFIDENCE
                } else {
                    SHORT_MATCH_CONFIDENCE
                };
                found.push(EntityCandidate {
                    text: matched.to_string(),
                    entity_type: kind.clone(),
                    confidence,
                });
            }
        }
        found
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self {
            topics: DEFAULT_TOPIC_KEYWORDS
                .iter()
                .map(|(name, keywords)| TopicRule {
                    name: name.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    matchers: keywords
                        .iter()
                        .map(|k| static_regex(&format!(r"\b{}\b", regex::escape(k))))
                        .collect(),
                })
                .collect(),
            patterns: DEFAULT_ENTITY_PATTERNS
                .iter()
                .map(|(kind, pattern)| (kind.to_uppercase(), static_regex(pattern)))
                .collect(),
        }
    }
}

#[async_trait]
impl Extractor for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn extract_topics(&self, text: &str) -> Result<Vec<TopicCandidate>> {
        Ok(self.topics_in(text))
    }

    async fn extract_entities(&self, text: &str) -> Result<Vec<EntityCandidate>> {
        Ok(self.entities_in(text))
    }
}

pub fn default_topic_keywords() -> BTreeMap<String, Vec<String>> {
    DEFAULT_TOPIC_KEYWORDS
        .iter()
        .map(|(name, keywords)| {
            (
                name.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}

pub fn default_entity_patterns() -> BTreeMap<String, String> {
    DEFAULT_ENTITY_PATTERNS
        .iter()
        .map(|(kind, pattern)| (kind.to_string(), pattern.to_string()))
        .collect()
}

fn compile(pattern: &str, owner: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            ConvographError::Configuration(format!("invalid pattern for {owner:?}: {e}"))
        })
}

fn static_regex(pattern: &str) -> Regex {
    compile(pattern, "built-in").expect("built-in patterns are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(found: &[EntityCandidate]) -> Vec<&str> {
        found.iter().map(|e| e.entity_type.as_str()).collect()
    }

    #[tokio::test]
    async fn test_phone_scenario() {
        let extractor = KeywordExtractor::default();
        let entities = extractor
            .extract_entities("Call me at 555-111-2222")
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "PHONE");
        assert_eq!(entities[0].text, "555-111-2222");
        assert_eq!(entities[0].confidence, LONG_MATCH_CONFIDENCE);

        assert!(extractor.extract_entities("Sure, I will").await.unwrap().is_empty());
        assert!(extractor.extract_topics("Call me at 555-111-2222").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_family() {
        let extractor = KeywordExtractor::default();
        let text = "Mail bob@example.com, see https://example.com/x on 12/05/2024 \
                    at 10:30 PM, it costs $1,200.50 and ping @dana";
        let entities = extractor.extract_entities(text).await.unwrap();
        let found = kinds(&entities);
        for kind in ["EMAIL", "URL", "DATE", "TIME", "MONEY", "MENTION"] {
            assert!(found.contains(&kind), "missing {kind} in {found:?}");
        }
    }

    #[tokio::test]
    async fn test_short_match_gets_lower_confidence() {
        let extractor = KeywordExtractor::default();
        let entities = extractor.extract_entities("ping @al").await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "@al");
        assert_eq!(entities[0].confidence, SHORT_MATCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_topic_confidence_is_match_ratio() {
        let extractor = KeywordExtractor::default();
        let topics = extractor
            .extract_topics("The Budget and the SALES forecast")
            .await
            .unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "business");
        assert!((topics[0].confidence - 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(topics[0].keywords.len(), 6);
    }

    #[tokio::test]
    async fn test_keywords_match_whole_words_only() {
        let extractor = KeywordExtractor::default();
        let topics = extractor.extract_topics("she said it again").await.unwrap();
        assert!(topics.is_empty(), "\"ai\" must not match inside words: {topics:?}");
    }

    #[tokio::test]
    async fn test_custom_tables() {
        let topics = BTreeMap::from([("sports".to_string(), vec!["goal".to_string()])]);
        let patterns = BTreeMap::from([("ticket".to_string(), r"\bJIRA-\d+\b".to_string())]);
        let extractor = KeywordExtractor::new(&topics, &patterns).expect("valid tables");

        let found = extractor.extract_topics("what a GOAL").await.unwrap();
        assert_eq!(found[0].confidence, 1.0);

        let entities = extractor.extract_entities("see jira-42").await.unwrap();
        assert_eq!(entities[0].entity_type, "TICKET");
    }

    #[test]
    fn test_invalid_custom_pattern_fails_fast() {
        let patterns = BTreeMap::from([("broken".to_string(), "(unclosed".to_string())]);
        let err = KeywordExtractor::new(&BTreeMap::new(), &patterns)
            .err()
            .expect("must fail");
        assert!(matches!(err, ConvographError::Configuration(_)));
    }

    #[test]
    fn test_default_tables_compile_through_settings() {
        assert!(KeywordExtractor::from_settings(&ExtractionSettings::default()).is_ok());
    }
}
