//! Speech-engine output consumed by the pipeline.
//!
//! The engine emits `segments[] = {start, end, text, speaker, confidence}` plus
//! optional `language` and `duration`. Diarization labels arrive as strings or
//! integers depending on the engine, so both are accepted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{ConvographError, Result};

/// Label used when the engine did not diarize a segment.
pub const UNKNOWN_SPEAKER: &str = "unknown";

/// One timestamped, speaker-labeled segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default = "unknown_speaker", deserialize_with = "speaker_label")]
    pub speaker: String,
    #[serde(default)]
    pub confidence: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: &str, speaker: &str) -> Self {
        Self {
            start,
            end,
            text: text.to_string(),
            speaker: speaker.to_string(),
            confidence: 1.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Output of the Transcribe stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub language: Option<String>,
    /// Seconds. When absent the conversation duration is the last segment end.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl TranscriptionResult {
    /// Parse and validate raw engine output.
    pub fn from_engine_output(raw: &Value) -> Result<Self> {
        if raw.get("segments").map_or(true, Value::is_null) {
            return Err(ConvographError::Input(
                "speech engine output has no segments".to_string(),
            ));
        }
        let result: TranscriptionResult = serde_json::from_value(raw.clone())
            .map_err(|e| ConvographError::Input(format!("malformed segment data: {e}")))?;
        result.validate()?;
        Ok(result)
    }

    /// Reject non-finite times, segments that end before they start and negative durations.
    pub fn validate(&self) -> Result<()> {
        validate_segments(&self.segments)?;
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ConvographError::Input(format!(
                    "invalid conversation duration: {duration}"
                )));
            }
        }
        Ok(())
    }

    /// Average segment confidence, 0 for an empty transcript.
    pub fn average_confidence(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        self.segments.iter().map(|s| s.confidence).sum::<f64>() / self.segments.len() as f64
    }

    /// Engine duration if reported, otherwise the latest segment end.
    pub fn effective_duration(&self) -> f64 {
        self.duration.unwrap_or_else(|| max_end(&self.segments))
    }
}

/// Check every segment's timing.
pub fn validate_segments(segments: &[Segment]) -> Result<()> {
    for (i, seg) in segments.iter().enumerate() {
        if !seg.start.is_finite() || !seg.end.is_finite() {
            return Err(ConvographError::Input(format!(
                "segment {i} has a non-finite timestamp"
            )));
        }
        if seg.end < seg.start {
            return Err(ConvographError::Input(format!(
                "segment {i} ends ({}) before it starts ({})",
                seg.end, seg.start
            )));
        }
    }
    Ok(())
}

/// Latest end time, 0 for no segments.
pub fn max_end(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.end).fold(0.0, f64::max)
}

fn unknown_speaker() -> String {
    UNKNOWN_SPEAKER.to_string()
}

fn speaker_label<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => unknown_speaker(),
    })
}
