//! Run command handlers
//!
//! Handles run inspection commands: listing, details, summary and sampled
//! history queries, and exit polling.

use anyhow::Result;
use basin_client::BasinClient;
use basin_core::domain::run::{RunInfo, RunState};
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List all active runs
    List,
    /// Get run details
    Get {
        /// Run identifier
        id: String,
    },
    /// Attach to a persisted run, restoring its session
    Attach {
        /// Run identifier
        id: String,
    },
    /// Show the run's current summary
    Summary {
        /// Run identifier
        id: String,
    },
    /// Sample one history series
    History {
        /// Run identifier
        id: String,

        /// History key to sample (e.g. "loss")
        #[arg(long)]
        key: String,

        /// Maximum number of points
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Check whether the run has finished exiting
    PollExit {
        /// Run identifier
        id: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = BasinClient::new(&config.server_url);

    match command {
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id } => get_run(&client, &id).await,
        RunCommands::Attach { id } => attach_run(&client, &id).await,
        RunCommands::Summary { id } => show_summary(&client, &id).await,
        RunCommands::History { id, key, samples } => {
            show_history(&client, &id, &key, samples).await
        }
        RunCommands::PollExit { id } => poll_exit(&client, &id).await,
    }
}

/// List all active runs
async fn list_runs(client: &BasinClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No active runs.".yellow());
    } else {
        println!("{}", format!("Found {} active run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

/// Get and display a single run
async fn get_run(client: &BasinClient, id: &str) -> Result<()> {
    let run = client.get_run(id).await?;
    print_run_details(&run);
    Ok(())
}

/// Attach to a run and display the restored session
async fn attach_run(client: &BasinClient, id: &str) -> Result<()> {
    let run = client.attach_run(id).await?;
    println!("{}", format!("Attached to run {}.", run.id).green());
    println!();
    print_run_details(&run);
    Ok(())
}

/// Show the run's summary projection
async fn show_summary(client: &BasinClient, id: &str) -> Result<()> {
    let response = client.get_summary(id).await?;

    if response.summary.is_empty() {
        println!("{}", format!("No summary values for run {}.", id).yellow());
    } else {
        println!("{}", format!("Summary for run {}:", id).bold());
        for (key, value) in response.summary {
            println!("  {}: {}", key.cyan(), value);
        }
    }

    Ok(())
}

/// Sample and display one history series
async fn show_history(
    client: &BasinClient,
    id: &str,
    key: &str,
    samples: Option<usize>,
) -> Result<()> {
    let response = client.sampled_history(id, key, samples).await?;

    if response.points.is_empty() {
        println!(
            "{}",
            format!("No history logged for key {:?} in run {}.", key, id).yellow()
        );
    } else {
        println!(
            "{}",
            format!("{} point(s) for {:?} in run {}:", response.points.len(), key, id).bold()
        );
        for point in response.points {
            println!("  step {:>8}  {}", point.step.to_string().dimmed(), point.value);
        }
    }

    Ok(())
}

/// Poll the run's exit state once
async fn poll_exit(client: &BasinClient, id: &str) -> Result<()> {
    let response = client.poll_exit(id).await?;

    if response.done {
        println!(
            "{}",
            format!("Run {} exited with code {}.", id, response.exit_code.unwrap_or(0)).green()
        );
    } else {
        println!("{}", format!("Run {} is still finalizing.", id).yellow());
    }

    Ok(())
}

/// Print a run summary line
fn print_run_summary(run: &RunInfo) {
    println!("  {} Run {}", "▸".cyan(), run.id.bold());
    println!("    State:   {}", colorize_state(run.state));
    if let Some(project) = &run.metadata.project {
        println!("    Project: {}", project.dimmed());
    }
    println!("    Records: {}", run.record_count);
    println!();
}

/// Print detailed run information
fn print_run_details(run: &RunInfo) {
    println!("{}", "Run Details:".bold());
    println!("  ID:      {}", run.id.cyan());
    println!("  State:   {}", colorize_state(run.state));
    if let Some(project) = &run.metadata.project {
        println!("  Project: {}", project);
    }
    if let Some(name) = &run.metadata.display_name {
        println!("  Name:    {}", name);
    }
    if !run.metadata.tags.is_empty() {
        println!("  Tags:    {}", run.metadata.tags.join(", ").dimmed());
    }
    println!(
        "  Created: {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!("  Records: {}", run.record_count);
    if !run.config.is_empty() {
        println!("  Config:");
        for (key, value) in &run.config {
            println!("    {}: {}", key.cyan(), value);
        }
    }
    if run.paused {
        println!("  {}", "Paused".yellow());
    }
    if run.preempting {
        println!("  {}", "Preempting".yellow());
    }
    if let Some(exit_code) = run.exit_code {
        println!("  Exit:    {}", exit_code);
    }
}

fn colorize_state(state: RunState) -> ColoredString {
    match state {
        RunState::Created => "created".normal(),
        RunState::Running => "running".green(),
        RunState::Exiting => "exiting".yellow(),
        RunState::Finished => "finished".blue(),
    }
}
