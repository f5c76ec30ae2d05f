//! Error types for convograph.

/// Alias for Results returning [`ConvographError`].
pub type Result<T> = std::result::Result<T, ConvographError>;

/// Top-level error type for convograph.
#[derive(Debug, thiserror::Error)]
pub enum ConvographError {
    /// Malformed or missing segment data. Fatal to the job.
    #[error("Input error: {0}")]
    Input(String),

    /// A single extractor call failed. Recovered locally as zero extractions.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A write was attempted while the graph backend is disabled or disconnected.
    #[error("Graph storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The graph backend rejected or failed a statement.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Webhook delivery failed.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Unknown backend, provider or method; invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A fatal pipeline stage failed.
    #[error("{stage} stage failed: {message}")]
    Stage { stage: &'static str, message: String },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvographError {
    /// Shorthand for a [`ConvographError::Storage`] built from any displayable error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// LLM-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimit,

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("Authentication failed")]
    Authentication,

    #[error("Completion timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                LlmError::Authentication
            }
            Some(status) if status.as_u16() == 429 => LlmError::RateLimit,
            Some(status) => LlmError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => LlmError::Transport(err.to_string()),
        }
    }
}
