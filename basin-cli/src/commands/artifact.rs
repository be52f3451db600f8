//! Artifact command handlers
//!
//! Handles artifact transfer commands: send, poll, watch, cancel, and
//! release.

use std::time::Duration;

use anyhow::Result;
use basin_client::BasinClient;
use basin_core::domain::transfer::{TransferFile, TransferJob, TransferSpec, TransferState};
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use crate::config::Config;

/// Artifact subcommands
#[derive(Subcommand)]
pub enum ArtifactCommands {
    /// Enqueue an artifact transfer
    Send {
        /// Artifact name
        name: String,

        /// Files to transfer, as source paths; staged under their file names
        #[arg(required = true)]
        files: Vec<String>,

        /// Artifact type (e.g. "model", "dataset")
        #[arg(long)]
        artifact_type: Option<String>,

        /// Run to associate the artifact with
        #[arg(long)]
        run: Option<String>,
    },
    /// Poll a transfer job once
    Poll {
        /// Transfer job id
        job_id: Uuid,
    },
    /// Poll a transfer job until it reaches a terminal state
    Watch {
        /// Transfer job id
        job_id: Uuid,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
    /// Cancel a pending or in-progress transfer
    Cancel {
        /// Transfer job id
        job_id: Uuid,
    },
    /// Free server-side bookkeeping for a finished transfer
    Release {
        /// Transfer job id
        job_id: Uuid,
    },
}

/// Handle artifact commands
pub async fn handle_artifact_command(command: ArtifactCommands, config: &Config) -> Result<()> {
    let client = BasinClient::new(&config.server_url);

    match command {
        ArtifactCommands::Send {
            name,
            files,
            artifact_type,
            run,
        } => send_artifact(&client, name, files, artifact_type, run).await,
        ArtifactCommands::Poll { job_id } => poll_job(&client, job_id).await,
        ArtifactCommands::Watch {
            job_id,
            interval_ms,
        } => watch_job(&client, job_id, interval_ms).await,
        ArtifactCommands::Cancel { job_id } => cancel_job(&client, job_id).await,
        ArtifactCommands::Release { job_id } => release_job(&client, job_id).await,
    }
}

async fn send_artifact(
    client: &BasinClient,
    name: String,
    files: Vec<String>,
    artifact_type: Option<String>,
    run: Option<String>,
) -> Result<()> {
    let files = files
        .into_iter()
        .map(|source| {
            let file_name = std::path::Path::new(&source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.clone());
            TransferFile {
                source,
                name: file_name,
            }
        })
        .collect();

    let response = client
        .artifact_send(TransferSpec {
            artifact_name: name,
            artifact_type,
            run_id: run,
            files,
        })
        .await?;

    println!("{}", "Transfer enqueued.".green());
    println!("  Job: {}", response.job_id.to_string().cyan());
    Ok(())
}

async fn poll_job(client: &BasinClient, job_id: Uuid) -> Result<()> {
    let job = client.artifact_poll(job_id).await?;
    print_job(&job);
    Ok(())
}

async fn watch_job(client: &BasinClient, job_id: Uuid, interval_ms: u64) -> Result<()> {
    loop {
        let job = client.artifact_poll(job_id).await?;
        print_job(&job);

        if job.state.is_terminal() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }
}

async fn cancel_job(client: &BasinClient, job_id: Uuid) -> Result<()> {
    client.artifact_cancel(job_id).await?;
    println!("{}", format!("Transfer {} cancelled.", job_id).yellow());
    Ok(())
}

async fn release_job(client: &BasinClient, job_id: Uuid) -> Result<()> {
    client.artifact_release(job_id).await?;
    println!("{}", format!("Transfer {} released.", job_id).green());
    Ok(())
}

fn print_job(job: &TransferJob) {
    let state = match job.state {
        TransferState::Pending => "pending".yellow(),
        TransferState::InProgress => "in progress".cyan(),
        TransferState::Done => "done".green(),
        TransferState::Cancelled => "cancelled".yellow(),
        TransferState::Error => "error".red(),
    };

    println!(
        "  {} {} [{}] {}/{} bytes, {}/{} file(s)",
        "▸".cyan(),
        job.artifact_name.bold(),
        state,
        job.progress.bytes_done,
        job.progress.bytes_total,
        job.progress.files_done,
        job.progress.files_total
    );
    if let Some(error) = &job.error {
        println!("    {}", error.red());
    }
}
