//! Job requests, status bookkeeping and the per-job runner.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{ConvographError, Result};
use crate::notifier::{CallbackPayload, Notifier};
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineServices};

/// One processing request as delivered by the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub request_id: String,
    #[serde(default)]
    pub audio_file_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub summarize: bool,
    #[serde(default)]
    pub translate: bool,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default = "default_true")]
    pub enable_graph_processing: bool,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default = "default_true")]
    pub punctuate: bool,
    #[serde(default = "default_true")]
    pub smart_format: bool,
    /// Speech engine output: `{segments, language?, duration?}`.
    #[serde(default)]
    pub engine_output: Value,
}

impl JobRequest {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            audio_file_id: None,
            language: None,
            model: default_model(),
            summarize: false,
            translate: false,
            target_language: None,
            enable_graph_processing: true,
            callback_url: None,
            punctuate: true,
            smart_format: true,
            engine_output: Value::Null,
        }
    }
}

fn default_model() -> String {
    "large-v2".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub request_id: String,
    pub status: JobStatus,
    /// 0–100.
    pub progress: u8,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(request_id: &str) -> Self {
        let now = Utc::now();
        Self {
            request_id: request_id.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn advance(&mut self, status: JobStatus, progress: u8) {
        self.status = status;
        self.progress = progress;
        self.updated_at = Utc::now();
        if status.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
    }
}

/// Job-status persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, record: JobRecord) -> Result<()>;
    async fn update(&self, record: JobRecord) -> Result<()>;
    async fn get(&self, request_id: &str) -> Result<Option<JobRecord>>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    records: DashMap<String, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, record: JobRecord) -> Result<()> {
        match self.records.entry(record.request_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ConvographError::Validation(
                format!("job {} already exists", record.request_id),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn update(&self, record: JobRecord) -> Result<()> {
        self.records.insert(record.request_id.clone(), record);
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.records.get(request_id).map(|r| r.value().clone()))
    }
}

/// Runs one job end to end: status bookkeeping, pipeline, callback.
#[derive(Clone)]
pub struct JobRunner {
    services: PipelineServices,
    store: Arc<dyn JobStore>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl JobRunner {
    pub fn new(
        services: PipelineServices,
        store: Arc<dyn JobStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            services,
            store,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Process `request` and return its terminal record.
    ///
    /// A job already `completed` is returned untouched, so redelivery of the
    /// same request is harmless. Job-store errors are the only `Err`s.
    pub async fn run(&self, request: JobRequest) -> Result<JobRecord> {
        let request_id = request.request_id.clone();
        let mut record = match self.store.get(&request_id).await? {
            Some(existing) if existing.status == JobStatus::Completed => {
                info!(request_id = %request_id, "job already completed; skipping redelivery");
                return Ok(existing);
            }
            Some(existing) => existing,
            None => {
                let record = JobRecord::pending(&request_id);
                self.store.create(record.clone()).await?;
                record
            }
        };

        record.error = None;
        record.result = None;
        record.advance(JobStatus::Processing, 10);
        self.store.update(record.clone()).await?;

        let outcome = match Pipeline::for_request(&self.services, &request) {
            Ok(pipeline) => pipeline.run(request.clone()).await.into_outcome(),
            Err(e) => PipelineOutcome::Failed(e.to_string()),
        };

        let settled = match outcome {
            PipelineOutcome::Completed(result) => result_value(&*result),
            PipelineOutcome::Failed(message) => Err(message),
        };
        match settled {
            Ok(value) => {
                record.result = Some(value);
                record.advance(JobStatus::Completed, 100);
                info!(request_id = %request_id, "job completed");
            }
            Err(message) => {
                warn!(request_id = %request_id, error = %message, "job failed");
                record.error = Some(message);
                record.advance(JobStatus::Failed, record.progress);
            }
        }
        self.store.update(record.clone()).await?;

        if let (Some(url), Some(notifier)) = (request.callback_url.as_deref(), &self.notifier) {
            notifier
                .notify(url, &CallbackPayload::from_record(&record))
                .await;
        }
        Ok(record)
    }
}

/// Render a pipeline result as JSON; an error becomes the job's failure message.
fn result_value<T: Serialize + ?Sized>(result: &T) -> std::result::Result<Value, String> {
    serde_json::to_value(result).map_err(|e| format!("failed to serialize job result: {e}"))
}
