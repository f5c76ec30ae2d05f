//! Formatting a transcription into the job result document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;
use crate::processor::GraphProcessingReport;
use crate::transcript::{Segment, TranscriptionResult};
use crate::utils::{capitalize_sentences, ensure_terminal_punctuation, normalize_whitespace};

/// Namespace for deterministic utterance IDs.
const UTTERANCE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_52b8_8e0d_4c3a_9b47_2d5e_8a61_f0c3);

/// Final document of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResult {
    pub metadata: ResultMetadata,
    pub results: TranscriptResults,
}

impl FormattedResult {
    pub fn transcript(&self) -> &str {
        &self.results.transcript
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub request_id: String,
    /// ISO-8601 creation time.
    pub created: String,
    pub duration: f64,
    pub language: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    /// Target language → translated transcript.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_processing: Option<GraphProcessingReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResults {
    pub transcript: String,
    pub confidence: f64,
    pub paragraphs: Vec<Paragraph>,
    pub utterances: Vec<Utterance>,
}

/// Consecutive segments of one speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub num_words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: Uuid,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
    pub speaker: String,
    pub transcript: String,
}

/// Formatting options taken from the job request.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub request_id: String,
    pub model: String,
    pub language: Option<String>,
    pub punctuate: bool,
    pub smart_format: bool,
}

/// Turns a transcription into the result document.
pub trait ResultFormatter: Send + Sync {
    fn format(
        &self,
        transcription: &TranscriptionResult,
        options: &FormatOptions,
    ) -> Result<FormattedResult>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptFormatter;

impl TranscriptFormatter {
    fn segment_text(segment: &Segment, options: &FormatOptions) -> String {
        let mut text = normalize_whitespace(&segment.text);
        if options.smart_format {
            text = capitalize_sentences(&text);
        }
        if options.punctuate {
            text = ensure_terminal_punctuation(&text);
        }
        text
    }
}

impl ResultFormatter for TranscriptFormatter {
    fn format(
        &self,
        transcription: &TranscriptionResult,
        options: &FormatOptions,
    ) -> Result<FormattedResult> {
        let mut ordered: Vec<&Segment> = transcription.segments.iter().collect();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut utterances = Vec::with_capacity(ordered.len());
        let mut paragraphs: Vec<Paragraph> = Vec::new();

        for (index, segment) in ordered.iter().enumerate() {
            let text = Self::segment_text(segment, options);
            if text.is_empty() {
                continue;
            }
            utterances.push(Utterance {
                id: Uuid::new_v5(
                    &UTTERANCE_NAMESPACE,
                    format!("{}:{index}", options.request_id).as_bytes(),
                ),
                start: segment.start,
                end: segment.end,
                confidence: segment.confidence,
                speaker: segment.speaker.clone(),
                transcript: text.clone(),
            });

            match paragraphs.last_mut() {
                Some(p) if p.speaker == segment.speaker => {
                    p.end = p.end.max(segment.end);
                    p.text.push(' ');
                    p.text.push_str(&text);
                    p.num_words += text.split_whitespace().count();
                }
                _ => paragraphs.push(Paragraph {
                    speaker: segment.speaker.clone(),
                    start: segment.start,
                    end: segment.end,
                    num_words: text.split_whitespace().count(),
                    text,
                }),
            }
        }

        let transcript = utterances
            .iter()
            .map(|u| u.transcript.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let language = transcription
            .language
            .clone()
            .or_else(|| options.language.clone())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(FormattedResult {
            metadata: ResultMetadata {
                request_id: options.request_id.clone(),
                created: chrono::Utc::now().to_rfc3339(),
                duration: round3(transcription.effective_duration()),
                language,
                model: options.model.clone(),
                summary: None,
                translations: BTreeMap::new(),
                graph_processing: None,
            },
            results: TranscriptResults {
                transcript,
                confidence: round3(transcription.average_confidence()),
                paragraphs,
                utterances,
            },
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
