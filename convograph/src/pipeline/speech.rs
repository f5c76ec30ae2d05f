//! Speech engine seam. Audio never enters this crate; the engine hands over
//! timestamped segments.

use async_trait::async_trait;

use crate::errors::Result;
use crate::jobs::JobRequest;
use crate::transcript::TranscriptionResult;

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn transcribe(&self, request: &JobRequest) -> Result<TranscriptionResult>;
}

/// Reads engine output that was computed upstream and carried in the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedSpeechEngine;

#[async_trait]
impl SpeechEngine for PrecomputedSpeechEngine {
    async fn transcribe(&self, request: &JobRequest) -> Result<TranscriptionResult> {
        TranscriptionResult::from_engine_output(&request.engine_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConvographError;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_engine_output() {
        let mut request = JobRequest::new("req");
        request.engine_output = json!({
            "segments": [{"start": 0.0, "end": 1.0, "text": "hi", "speaker": 1}],
            "language": "en"
        });
        let result = PrecomputedSpeechEngine.transcribe(&request).await.unwrap();
        assert_eq!(result.segments[0].speaker, "1");
    }

    #[tokio::test]
    async fn test_missing_segments_is_input_error() {
        let request = JobRequest::new("req");
        let err = PrecomputedSpeechEngine.transcribe(&request).await.unwrap_err();
        assert!(matches!(err, ConvographError::Input(_)));
    }
}
