use std::path::PathBuf;
use std::sync::Arc;

use convograph::jobs::{InMemoryJobStore, JobRequest, JobRunner};
use convograph::pipeline::PipelineServices;
use serde_json::json;
use tempfile::TempDir;

/// Temporary job spool directory with helpers for building integration tests.
pub struct TempSpool {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempSpool {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp spool dir");
        let path = dir.path().to_path_buf();
        Self { dir, path }
    }

    /// Write raw file content relative to the spool root.
    pub fn write_raw(&self, rel: &str, content: &str) -> PathBuf {
        let full = self.path.join(rel);
        std::fs::write(&full, content).expect("write spool file");
        full
    }

    pub fn write_job(&self, rel: &str, request: &JobRequest) -> PathBuf {
        let body = serde_json::to_string(request).expect("serialize job");
        self.write_raw(rel, &body)
    }
}

/// A two-segment job with valid engine output.
pub fn job(request_id: &str) -> JobRequest {
    let mut request = JobRequest::new(request_id);
    request.engine_output = json!({
        "segments": [
            {"start": 0.0, "end": 2.5, "text": "hello there", "speaker": "SPEAKER_00"},
            {"start": 2.5, "end": 4.0, "text": "hi", "speaker": "SPEAKER_01"}
        ],
        "language": "en",
        "duration": 4.0
    });
    request
}

/// Runner over the bundled services with no graph, notifier or enrichment.
pub fn runner() -> JobRunner {
    JobRunner::new(
        PipelineServices::basic(),
        Arc::new(InMemoryJobStore::new()),
        None,
    )
}
