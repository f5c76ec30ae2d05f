//! Text processing utilities.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static SENTENCE_START_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

fn sentence_start_re() -> &'static Regex {
    SENTENCE_START_RE
        .get_or_init(|| Regex::new(r"(^|[.!?]\s+)(\p{Ll})").expect("static regex is valid"))
}

/// Replace consecutive whitespace (spaces, tabs, newlines) with a single space
/// and trim leading/trailing whitespace.
///
/// Returns an empty string for inputs that are entirely whitespace.
pub fn normalize_whitespace(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Uppercase the first letter of every sentence.
pub fn capitalize_sentences(s: &str) -> String {
    sentence_start_re()
        .replace_all(s, |caps: &regex::Captures<'_>| {
            format!("{}{}", &caps[1], caps[2].to_uppercase())
        })
        .into_owned()
}

/// Collapse whitespace and make sure non-empty text ends in `.`, `!` or `?`.
pub fn ensure_terminal_punctuation(s: &str) -> String {
    let mut out = normalize_whitespace(s);
    if !out.is_empty() && !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Truncate `s` to at most `max_len` Unicode scalar values, appending `"..."` if
/// truncation occurred. `max_len` counts characters (not bytes).
///
/// Used to keep log fields and prompt payloads bounded.
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }

    if s.chars().count() <= max_len {
        return s.to_string();
    }

    if max_len <= 3 {
        return ".".repeat(max_len);
    }

    let byte_offset = s
        .char_indices()
        .nth(max_len - 3)
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    format!("{}...", &s[..byte_offset])
}

/// Extract the first JSON object or array from a potentially markdown-wrapped
/// LLM response.
///
/// Tries, in order:
/// 1. ` ```json ... ``` ` fenced code block
/// 2. ` ``` ... ``` ` fenced code block
/// 3. Bare `[...]` or `{...}`, whichever opens first
///
/// Returns `None` if no JSON-like content is found.
pub fn extract_json_from_response(s: &str) -> Option<&str> {
    if let Some(inner) = extract_fenced_block(s, "```json") {
        return Some(inner);
    }

    if let Some(inner) = extract_fenced_block(s, "```") {
        return Some(inner);
    }

    let array = bracketed(s, '[', ']');
    let object = bracketed(s, '{', '}');
    match (array, object) {
        (Some(a), Some(o)) => {
            // An array of objects contains braces too; prefer the outer delimiter.
            if s.find('[') < s.find('{') {
                Some(a)
            } else {
                Some(o)
            }
        }
        (a, o) => a.or(o),
    }
}

fn bracketed(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

/// Extract content inside a fenced code block starting with `fence`.
fn extract_fenced_block<'a>(s: &'a str, fence: &str) -> Option<&'a str> {
    let start = s.find(fence)?;
    let after_fence = start + fence.len();

    let newline = s[after_fence..].find('\n')?;
    let content_start = after_fence + newline + 1;

    let close = s[content_start..].find("```")?;
    let content = s[content_start..content_start + close].trim();

    if content.is_empty() {
        return None;
    }

    Some(content)
}
