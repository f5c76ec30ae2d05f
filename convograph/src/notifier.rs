//! Completion webhooks.
//!
//! One POST per finished job, bounded by a fixed timeout. Delivery failures are
//! logged and dropped; they never change the job's status and are not retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{ConvographError, Result};
use crate::jobs::{JobRecord, JobStatus};

/// Body of the completion webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub request_id: String,
    /// `completed` or `failed`.
    pub status: JobStatus,
    /// ISO-8601.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackPayload {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            status: record.status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            result: record.result.clone(),
            error: record.error.clone(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `payload` to `url`. Never fails; problems are logged.
    async fn notify(&self, url: &str, payload: &CallbackPayload);
}

pub struct WebhookNotifier {
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvographError::Configuration(format!("webhook client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Single delivery attempt; non-2xx and transport errors become
    /// [`ConvographError::Notification`].
    pub async fn deliver(&self, url: &str, payload: &CallbackPayload) -> Result<()> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| ConvographError::Notification(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConvographError::Notification(format!(
                "callback returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) {
        match self.deliver(url, payload).await {
            Ok(()) => info!(request_id = %payload.request_id, url, "callback delivered"),
            Err(e) => warn!(request_id = %payload.request_id, url, error = %e, "callback failed"),
        }
    }
}
