//! Runtime settings loaded once at startup.
//!
//! Every string-keyed choice (graph backend, LLM provider, extraction method)
//! is parsed into an enum here, so an unknown key is a
//! [`ConvographError::Configuration`] at load time rather than a mid-run surprise.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{ConvographError, Result};

// ── Keyed choices ─────────────────────────────────────────────────────────────

/// Graph storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,
    ArangoDb,
    Memory,
}

impl FromStr for GraphBackend {
    type Err = ConvographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neo4j" => Ok(Self::Neo4j),
            "arangodb" | "arango" => Ok(Self::ArangoDb),
            "memory" => Ok(Self::Memory),
            other => Err(ConvographError::Configuration(format!(
                "unsupported graph database type: {other}"
            ))),
        }
    }
}

/// How topics are extracted from segment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicMethod {
    KeywordMatching,
    LlmBased,
    Hybrid,
}

impl FromStr for TopicMethod {
    type Err = ConvographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword_matching" => Ok(Self::KeywordMatching),
            "llm_based" => Ok(Self::LlmBased),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConvographError::Configuration(format!(
                "unknown topic extraction method: {other}"
            ))),
        }
    }
}

/// How entities are extracted from segment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityMethod {
    RegexPatterns,
    LlmBased,
    Hybrid,
}

impl FromStr for EntityMethod {
    type Err = ConvographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regex_patterns" => Ok(Self::RegexPatterns),
            "llm_based" => Ok(Self::LlmBased),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConvographError::Configuration(format!(
                "unknown entity extraction method: {other}"
            ))),
        }
    }
}

/// Text-completion provider behind the LLM extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAi,
    OpenRouter,
    Anthropic,
    Local,
}

impl LlmProviderKind {
    /// Provider-specific environment variable consulted when `GRAPH_LLM_API_KEY` is unset.
    pub fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Local => None,
        }
    }

    /// Base URL used when `GRAPH_LLM_API_BASE` is unset.
    pub fn default_api_base(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Local => "http://localhost:8080",
        }
    }
}

impl FromStr for LlmProviderKind {
    type Err = ConvographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "anthropic" => Ok(Self::Anthropic),
            "local" => Ok(Self::Local),
            other => Err(ConvographError::Configuration(format!(
                "unsupported LLM provider: {other}"
            ))),
        }
    }
}

impl fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

// ── Settings sections ─────────────────────────────────────────────────────────

/// Graph database connection settings.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseSettings {
    pub backend: GraphBackend,

    /// Bolt URI for Neo4j, HTTP endpoint for ArangoDB.
    #[validate(length(min = 1))]
    pub url: String,

    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    /// Database name (Neo4j database or ArangoDB `_db`).
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(range(min = 1))]
    pub max_connection_pool_size: usize,

    /// Statements per write batch when persisting a conversation graph.
    #[validate(range(min = 1))]
    pub write_batch_size: usize,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connection_pool_size", &self.max_connection_pool_size)
            .field("write_batch_size", &self.write_batch_size)
            .finish()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Neo4j,
            url: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: "password".to_string(),
            name: "neo4j".to_string(),
            max_connection_pool_size: 50,
            write_batch_size: 100,
        }
    }
}

/// Extraction strategy selection and tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    pub topic_method: TopicMethod,
    pub entity_method: EntityMethod,
    /// Topic name → keywords. `None` selects the built-in table.
    pub topic_keywords: Option<BTreeMap<String, Vec<String>>>,
    /// Entity type → regex. `None` selects the built-in pattern family.
    pub entity_patterns: Option<BTreeMap<String, String>>,
    /// Ask the completion provider for per-segment sentiment.
    #[serde(default)]
    pub sentiment_enabled: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            topic_method: TopicMethod::KeywordMatching,
            entity_method: EntityMethod::RegexPatterns,
            topic_keywords: None,
            entity_patterns: None,
            sentiment_enabled: false,
        }
    }
}

impl ExtractionSettings {
    /// Whether either strategy, or sentiment analysis, needs a completion provider.
    pub fn uses_llm(&self) -> bool {
        !matches!(self.topic_method, TopicMethod::KeywordMatching)
            || !matches!(self.entity_method, EntityMethod::RegexPatterns)
            || self.sentiment_enabled
    }
}

/// Completion-provider settings.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,

    #[validate(length(min = 1))]
    pub model: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub api_base: Option<String>,

    #[validate(range(min = 1))]
    pub max_tokens: u32,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    /// Upper bound on one completion call, retries included.
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            api_base: None,
            max_tokens: 1_000,
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

impl LlmSettings {
    /// Base URL after applying the provider default.
    pub fn resolved_api_base(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.provider.default_api_base().to_string())
    }
}

/// Bulk-import settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoaderSettings {
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Chunks in flight at once.
    #[validate(range(min = 1))]
    pub concurrency: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            concurrency: 4,
        }
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Central configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    /// Master switch for graph persistence and the GraphBuild stage.
    pub graph_enabled: bool,

    #[validate(nested)]
    pub database: DatabaseSettings,

    pub extraction: ExtractionSettings,

    #[validate(nested)]
    pub llm: LlmSettings,

    pub summarization_enabled: bool,

    pub translation_enabled: bool,

    /// Webhook request timeout.
    #[validate(range(min = 1))]
    pub callback_timeout_secs: u64,

    #[validate(nested)]
    pub loader: LoaderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            graph_enabled: false,
            database: DatabaseSettings::default(),
            extraction: ExtractionSettings::default(),
            llm: LlmSettings::default(),
            summarization_enabled: false,
            translation_enabled: false,
            callback_timeout_secs: 30,
            loader: LoaderSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` first (non-fatal if `.env` is absent).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseSettings {
            backend: parse_or(&var, "GRAPH_DATABASE_TYPE", defaults.database.backend)?,
            url: var("GRAPH_DATABASE_URL").unwrap_or(defaults.database.url),
            username: var("GRAPH_DATABASE_USERNAME").unwrap_or(defaults.database.username),
            password: var("GRAPH_DATABASE_PASSWORD").unwrap_or(defaults.database.password),
            name: var("GRAPH_DATABASE_NAME").unwrap_or(defaults.database.name),
            max_connection_pool_size: parse_or(
                &var,
                "GRAPH_DATABASE_MAX_CONNECTION_POOL_SIZE",
                defaults.database.max_connection_pool_size,
            )?,
            write_batch_size: parse_or(
                &var,
                "GRAPH_PROCESSING_BATCH_SIZE",
                defaults.database.write_batch_size,
            )?,
        };

        let extraction = ExtractionSettings {
            topic_method: parse_or(
                &var,
                "GRAPH_TOPIC_EXTRACTION_METHOD",
                defaults.extraction.topic_method,
            )?,
            entity_method: parse_or(
                &var,
                "GRAPH_ENTITY_EXTRACTION_METHOD",
                defaults.extraction.entity_method,
            )?,
            topic_keywords: parse_json(&var, "GRAPH_TOPIC_KEYWORDS")?,
            entity_patterns: parse_json(&var, "GRAPH_ENTITY_EXTRACTION_PATTERNS")?,
            sentiment_enabled: parse_bool(
                &var,
                "GRAPH_SENTIMENT_ANALYSIS_ENABLED",
                defaults.extraction.sentiment_enabled,
            )?,
        };

        let provider: LlmProviderKind =
            parse_or(&var, "GRAPH_LLM_PROVIDER", defaults.llm.provider)?;
        let api_key = var("GRAPH_LLM_API_KEY")
            .or_else(|| provider.api_key_var().and_then(|name| var(name)));

        let llm = LlmSettings {
            provider,
            model: var("GRAPH_LLM_MODEL").unwrap_or(defaults.llm.model),
            api_key,
            api_base: var("GRAPH_LLM_API_BASE"),
            max_tokens: parse_or(&var, "GRAPH_LLM_MAX_TOKENS", defaults.llm.max_tokens)?,
            temperature: parse_or(&var, "GRAPH_LLM_TEMPERATURE", defaults.llm.temperature)?,
            timeout_secs: parse_or(&var, "GRAPH_LLM_TIMEOUT_SECS", defaults.llm.timeout_secs)?,
        };

        let loader = LoaderSettings {
            batch_size: parse_or(&var, "IMPORT_BATCH_SIZE", defaults.loader.batch_size)?,
            concurrency: parse_or(&var, "IMPORT_CONCURRENCY", defaults.loader.concurrency)?,
        };

        let settings = Self {
            graph_enabled: parse_bool(&var, "GRAPH_ENABLED", defaults.graph_enabled)?,
            database,
            extraction,
            llm,
            summarization_enabled: parse_bool(
                &var,
                "ENABLE_SUMMARIZATION",
                defaults.summarization_enabled,
            )?,
            translation_enabled: parse_bool(
                &var,
                "TRANSLATION_ENABLED",
                defaults.translation_enabled,
            )?,
            callback_timeout_secs: parse_or(
                &var,
                "CALLBACK_TIMEOUT_SECS",
                defaults.callback_timeout_secs,
            )?,
            loader,
        };

        settings
            .validate()
            .map_err(|e| ConvographError::Configuration(e.to_string()))?;

        Ok(settings)
    }

    /// Whether any configured feature needs a completion provider.
    pub fn needs_completion_provider(&self) -> bool {
        self.extraction.uses_llm() || self.summarization_enabled || self.translation_enabled
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConvographError::Configuration(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

fn parse_bool<F>(var: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConvographError::Configuration(format!(
            "Invalid {name}: expected a boolean, got {v:?}"
        ))),
    }
}

fn parse_json<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| ConvographError::Configuration(format!("Invalid {name}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).expect("defaults should load");
        assert!(!settings.graph_enabled);
        assert_eq!(settings.database.backend, GraphBackend::Neo4j);
        assert_eq!(settings.database.url, "bolt://localhost:7687");
        assert_eq!(settings.extraction.topic_method, TopicMethod::KeywordMatching);
        assert_eq!(settings.extraction.entity_method, EntityMethod::RegexPatterns);
        assert_eq!(settings.llm.model, "gpt-3.5-turbo");
        assert_eq!(settings.llm.max_tokens, 1_000);
        assert_eq!(settings.loader.batch_size, 1_000);
        assert_eq!(settings.callback_timeout_secs, 30);
        assert!(!settings.needs_completion_provider());
    }

    #[test]
    fn test_settings_custom_values() {
        let settings = Settings::from_lookup(lookup(&[
            ("GRAPH_ENABLED", "true"),
            ("GRAPH_DATABASE_TYPE", "arangodb"),
            ("GRAPH_DATABASE_URL", "http://arango:8529"),
            ("GRAPH_DATABASE_NAME", "transcripts"),
            ("GRAPH_TOPIC_EXTRACTION_METHOD", "hybrid"),
            ("GRAPH_ENTITY_EXTRACTION_METHOD", "llm_based"),
            ("GRAPH_TOPIC_KEYWORDS", r#"{"sports": ["goal", "match"]}"#),
            ("GRAPH_LLM_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("IMPORT_CONCURRENCY", "8"),
        ]))
        .expect("settings should load");

        assert!(settings.graph_enabled);
        assert_eq!(settings.database.backend, GraphBackend::ArangoDb);
        assert_eq!(settings.database.name, "transcripts");
        assert_eq!(settings.extraction.topic_method, TopicMethod::Hybrid);
        assert_eq!(settings.extraction.entity_method, EntityMethod::LlmBased);
        let keywords = settings.extraction.topic_keywords.as_ref().expect("keywords");
        assert_eq!(keywords["sports"], vec!["goal", "match"]);
        assert_eq!(settings.llm.provider, LlmProviderKind::Anthropic);
        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(settings.loader.concurrency, 8);
        assert!(settings.needs_completion_provider());
    }

    #[test]
    fn test_sentiment_needs_completion_provider() {
        let settings =
            Settings::from_lookup(lookup(&[("GRAPH_SENTIMENT_ANALYSIS_ENABLED", "true")]))
                .expect("settings should load");
        assert!(settings.extraction.sentiment_enabled);
        assert!(settings.needs_completion_provider());
    }

    #[test]
    fn test_generic_api_key_wins_over_provider_key() {
        let settings = Settings::from_lookup(lookup(&[
            ("GRAPH_LLM_API_KEY", "generic"),
            ("OPENAI_API_KEY", "specific"),
        ]))
        .expect("settings should load");
        assert_eq!(settings.llm.api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn test_unknown_backend_is_configuration_error() {
        let err = Settings::from_lookup(lookup(&[("GRAPH_DATABASE_TYPE", "cassandra")]))
            .expect_err("unknown backend must fail");
        match err {
            ConvographError::Configuration(msg) => assert!(msg.contains("cassandra")),
            e => panic!("expected Configuration error, got {:?}", e),
        }
    }

    #[test]
    fn test_unknown_extraction_method_is_configuration_error() {
        let err = Settings::from_lookup(lookup(&[("GRAPH_TOPIC_EXTRACTION_METHOD", "magic")]))
            .expect_err("unknown method must fail");
        assert!(matches!(err, ConvographError::Configuration(_)));
    }

    #[test]
    fn test_invalid_number_and_bool() {
        assert!(Settings::from_lookup(lookup(&[("IMPORT_BATCH_SIZE", "lots")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("GRAPH_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn test_zero_batch_size_fails_validation() {
        let err = Settings::from_lookup(lookup(&[("IMPORT_BATCH_SIZE", "0")]))
            .expect_err("zero batch size must fail");
        assert!(matches!(err, ConvographError::Configuration(_)));
    }

    #[test]
    fn test_invalid_json_table() {
        let err = Settings::from_lookup(lookup(&[("GRAPH_ENTITY_EXTRACTION_PATTERNS", "[1,2")]))
            .expect_err("bad json must fail");
        assert!(matches!(err, ConvographError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Settings::from_lookup(lookup(&[
            ("GRAPH_DATABASE_PASSWORD", "hunter2"),
            ("GRAPH_LLM_API_KEY", "sk-secret"),
        ]))
        .expect("settings should load");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-secret"));
    }
}
