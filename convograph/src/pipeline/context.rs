//! Shared state threaded through the pipeline stages of one job.

use crate::errors::{ConvographError, Result};
use crate::jobs::JobRequest;
use crate::processor::{GraphProcessingReport, GraphRunStats};
use crate::transcript::TranscriptionResult;

use super::format::FormattedResult;

/// Mutable context owned by one run. Each stage reads what the earlier stages
/// produced and fills in its own slot.
#[derive(Debug)]
pub struct ProcessingContext {
    pub request: JobRequest,
    pub transcription: Option<TranscriptionResult>,
    pub formatted: Option<FormattedResult>,
    /// First fatal failure. Once set, later fatal stages do nothing.
    pub error: Option<ConvographError>,
    /// Result of the best-effort graph stage; `None` when it did not run.
    pub graph_outcome: Option<Result<GraphRunStats>>,
}

impl ProcessingContext {
    pub fn new(request: JobRequest) -> Self {
        Self {
            request,
            transcription: None,
            formatted: None,
            error: None,
            graph_outcome: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Final verdict of the run. The graph outcome is folded into
    /// `metadata.graph_processing` of a successful result.
    pub fn into_outcome(self) -> PipelineOutcome {
        if let Some(error) = self.error {
            return PipelineOutcome::Failed(error.to_string());
        }
        match self.formatted {
            Some(mut formatted) => {
                if let Some(outcome) = self.graph_outcome {
                    formatted.metadata.graph_processing = Some(GraphProcessingReport::from(outcome));
                }
                PipelineOutcome::Completed(Box::new(formatted))
            }
            None => PipelineOutcome::Failed("pipeline produced no result".to_string()),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(Box<FormattedResult>),
    Failed(String),
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    pub fn result(&self) -> Option<&FormattedResult> {
        match self {
            PipelineOutcome::Completed(result) => Some(result),
            PipelineOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Completed(_) => None,
            PipelineOutcome::Failed(message) => Some(message),
        }
    }
}
