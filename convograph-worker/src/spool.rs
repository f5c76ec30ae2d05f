//! Job files and their dispatch onto worker tasks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use convograph::jobs::{JobRequest, JobRunner, JobStatus};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

/// One line of worker output per job file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// `None` when the file could not be turned into a job.
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSummary {
    fn rejected(file: &Path, error: impl ToString) -> Self {
        Self {
            file: file.display().to_string(),
            request_id: None,
            status: None,
            error: Some(error.to_string()),
        }
    }
}

pub async fn read_job(path: &Path) -> anyhow::Result<JobRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read job file '{}': {}", path.display(), e))?;
    let request: JobRequest = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid job file '{}': {}", path.display(), e))?;
    if request.request_id.trim().is_empty() {
        anyhow::bail!("Job file '{}' has an empty request_id", path.display());
    }
    Ok(request)
}

async fn run_file(runner: &JobRunner, path: &Path) -> JobSummary {
    let request = match read_job(path).await {
        Ok(request) => request,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "job file rejected");
            return JobSummary::rejected(path, e);
        }
    };
    let request_id = request.request_id.clone();
    match runner.run(request).await {
        Ok(record) => JobSummary {
            file: path.display().to_string(),
            request_id: Some(record.request_id),
            status: Some(record.status),
            error: record.error,
        },
        Err(e) => JobSummary {
            file: path.display().to_string(),
            request_id: Some(request_id),
            status: None,
            error: Some(e.to_string()),
        },
    }
}

fn joined(result: Result<JobSummary, JoinError>) -> JobSummary {
    result.unwrap_or_else(|e| JobSummary {
        file: String::new(),
        request_id: None,
        status: None,
        error: Some(format!("worker task aborted: {e}")),
    })
}

/// Run every job file on its own task, at most `concurrency` at once.
///
/// `on_done` sees each summary as its job finishes. Once `shutdown` resolves no
/// further files are dispatched; jobs already running are awaited.
pub async fn dispatch<S, F>(
    runner: JobRunner,
    files: Vec<PathBuf>,
    concurrency: usize,
    shutdown: S,
    mut on_done: F,
) -> Vec<JobSummary>
where
    S: Future<Output = ()>,
    F: FnMut(&JobSummary),
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut summaries = Vec::with_capacity(files.len());
    tokio::pin!(shutdown);

    let total = files.len();
    for (dispatched, path) in files.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!(dispatched, remaining = total - dispatched, "shutdown requested; dispatch stopped");
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        let runner = runner.clone();
        tasks.spawn(async move {
            let _permit = permit;
            run_file(&runner, &path).await
        });

        while let Some(result) = tasks.try_join_next() {
            let summary = joined(result);
            on_done(&summary);
            summaries.push(summary);
        }
    }

    while let Some(result) = tasks.join_next().await {
        let summary = joined(result);
        on_done(&summary);
        summaries.push(summary);
    }
    info!(jobs = summaries.len(), "dispatch finished");
    summaries
}
