//! Prompt templates for LLM interactions.
//!
//! Prompts are stored as Rust string literals for compile-time inclusion.
//! Extraction prompts ask for a bare JSON array so the response can be parsed
//! without any model-specific structured-output support.

use crate::utils::truncate_with_ellipsis;

/// Longest segment text embedded in an extraction prompt, in characters.
const MAX_PROMPT_TEXT: usize = 4_000;

/// System instruction shared by the extraction prompts.
pub const EXTRACTION_SYSTEM: &str =
    "You are an information extraction engine. Respond with valid JSON only, no prose.";

/// Prompt asking for the topics discussed in `text`.
///
/// Expected response: `[{"topic_name": str, "confidence": 0..1, "keywords": [str]}]`.
pub fn topic_extraction(text: &str) -> String {
    format!(
        "Identify the main topics discussed in the following conversation excerpt.\n\
         Return a JSON array where each element has:\n\
         - \"topic_name\": a short topic label\n\
         - \"confidence\": a number between 0 and 1\n\
         - \"keywords\": the words from the text that indicate the topic\n\
         Return [] if there is no clear topic.\n\n\
         Text:\n\"\"\"\n{}\n\"\"\"",
        truncate_with_ellipsis(text, MAX_PROMPT_TEXT)
    )
}

/// Prompt asking for the named entities in `text`.
///
/// Expected response: `[{"entity_text": str, "entity_type": str, "confidence": 0..1}]`.
pub fn entity_extraction(text: &str) -> String {
    format!(
        "Extract the named entities from the following conversation excerpt.\n\
         Use entity types such as PERSON, ORGANIZATION, LOCATION, DATE, TIME, MONEY, \
         PRODUCT, EVENT, EMAIL, PHONE, URL.\n\
         Return a JSON array where each element has:\n\
         - \"entity_text\": the entity exactly as written in the text\n\
         - \"entity_type\": one of the types above\n\
         - \"confidence\": a number between 0 and 1\n\
         Return [] if there are no entities.\n\n\
         Text:\n\"\"\"\n{}\n\"\"\"",
        truncate_with_ellipsis(text, MAX_PROMPT_TEXT)
    )
}

/// Prompt asking for the sentiment of one segment.
///
/// Expected response: `{"sentiment": "positive"|"negative"|"neutral", "confidence": 0..1,
/// "emotions": [str], "intensity": 0..1}`.
pub fn sentiment_analysis(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following conversation excerpt.\n\
         Return a JSON object with:\n\
         - \"sentiment\": one of positive, negative, neutral\n\
         - \"confidence\": a number between 0 and 1\n\
         - \"emotions\": a list of emotions expressed, possibly empty\n\
         - \"intensity\": a number between 0 and 1\n\n\
         Text:\n\"\"\"\n{}\n\"\"\"",
        truncate_with_ellipsis(text, MAX_PROMPT_TEXT)
    )
}

/// Prompt asking for an abstractive summary of a full transcript.
pub fn summarization(transcript: &str) -> String {
    format!(
        "Summarize the following conversation transcript in a few sentences. \
         Mention the participants' main points and any decisions or action items.\n\n\
         Transcript:\n\"\"\"\n{transcript}\n\"\"\""
    )
}

/// Prompt asking for a translation of `text` into `target_language`.
pub fn translation(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text into the language with code \"{target_language}\". \
         Preserve meaning and tone. Respond with the translation only.\n\n\
         Text:\n\"\"\"\n{text}\n\"\"\""
    )
}
