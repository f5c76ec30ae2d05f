use std::path::PathBuf;

use clap::{Parser, Subcommand};
use convograph::{Runtime, Settings};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use convograph_worker::{
    config::{LogFormat, WorkerConfig},
    spool,
};

#[derive(Debug, Parser)]
#[command(name = "convograph-worker", version, about = "Transcript graph pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process job files; prints one JSON line per finished job.
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Bulk-import node, relation and concept CSV files from a directory.
    Import {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        job_id: String,
    },
    /// Counts for one import job, or for the whole graph without `--job-id`.
    Stats {
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Delete everything imported under a job.
    Purge {
        #[arg(long)]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let worker = WorkerConfig::from_env()?;

    // ── Tracing ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&worker.log_level))?;
    match worker.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .pretty()
            .init(),
    }

    // ── Config ────────────────────────────────────────────────────────────────
    let mut settings = Settings::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    if !matches!(cli.command, Command::Run { .. }) && !settings.graph_enabled {
        info!("graph storage enabled for this command");
        settings.graph_enabled = true;
    }
    info!(
        backend = ?settings.database.backend,
        graph_enabled = settings.graph_enabled,
        concurrency = worker.concurrency,
        "configuration loaded"
    );

    // ── Runtime ───────────────────────────────────────────────────────────────
    let runtime = Runtime::from_settings(settings)?;
    runtime.initialize().await?;

    let outcome = execute(&runtime, &worker, cli.command).await;

    if let Err(e) = runtime.shutdown().await {
        error!(error = %e, "storage shutdown failed");
    }
    info!("worker stopped");
    outcome
}

async fn execute(runtime: &Runtime, worker: &WorkerConfig, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run { files } => {
            let summaries = spool::dispatch(
                runtime.runner().clone(),
                files,
                worker.concurrency,
                shutdown_signal(),
                |summary| match serde_json::to_string(summary) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(error = %e, "cannot serialize job summary"),
                },
            )
            .await;
            let failed = summaries
                .iter()
                .filter(|s| s.status != Some(convograph::jobs::JobStatus::Completed))
                .count();
            info!(jobs = summaries.len(), failed, "run finished");
        }
        Command::Import { dir, job_id } => {
            let report = runtime.loader().load_directory(&dir, &job_id).await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Stats { job_id: Some(job_id) } => {
            let stats = runtime.loader().job_statistics(&job_id).await;
            println!("{}", serde_json::to_string(&stats)?);
        }
        Command::Stats { job_id: None } => {
            let stats = runtime.graph_store().database_stats().await;
            println!("{}", serde_json::to_string(&stats)?);
        }
        Command::Purge { job_id } => {
            let deleted = runtime.loader().delete_job_data(&job_id).await?;
            println!("{}", serde_json::json!({ "job_id": job_id, "deleted": deleted }));
        }
    }
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl-C, shutting down"); }
        _ = terminate => { info!("received SIGTERM, shutting down"); }
    }
}
