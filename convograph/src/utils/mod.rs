//! Shared utilities.
//!
//! Includes:
//! - Text normalization and transcript formatting helpers
//! - JSON extraction from LLM responses
//! - Storage timestamp formatting

pub mod datetime;
pub mod text;

pub use datetime::{format_storage_timestamp, storage_now};
pub use text::{
    capitalize_sentences, ensure_terminal_punctuation, extract_json_from_response,
    normalize_whitespace, truncate_with_ellipsis,
};
