//! Server command handlers
//!
//! Handles server lifecycle commands: init, status, info, version check,
//! shutdown, and teardown.

use anyhow::Result;
use basin_client::BasinClient;
use basin_core::dto::server::{ServerPhase, ServerStatusResponse};
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Server subcommands
#[derive(Subcommand)]
pub enum ServerCommands {
    /// Mark the server ready for run-scoped calls
    Init,
    /// Show server status
    Status,
    /// Show server name and version
    Info,
    /// Check whether a client version is compatible
    CheckVersion {
        /// Client version string (e.g. "0.1.0")
        version: String,
    },
    /// Ask the server to stop serving
    Shutdown,
    /// Tear the server down (terminal)
    Teardown,
}

/// Handle server commands
pub async fn handle_server_command(command: ServerCommands, config: &Config) -> Result<()> {
    let client = BasinClient::new(&config.server_url);

    match command {
        ServerCommands::Init => init_server(&client).await,
        ServerCommands::Status => show_status(&client).await,
        ServerCommands::Info => show_info(&client).await,
        ServerCommands::CheckVersion { version } => check_version(&client, &version).await,
        ServerCommands::Shutdown => shutdown_server(&client).await,
        ServerCommands::Teardown => teardown_server(&client).await,
    }
}

async fn init_server(client: &BasinClient) -> Result<()> {
    client.inform_init().await?;
    println!("{}", "Server initialized.".green());
    Ok(())
}

async fn show_status(client: &BasinClient) -> Result<()> {
    let status = client.server_status().await?;
    print_status(&status);
    Ok(())
}

async fn show_info(client: &BasinClient) -> Result<()> {
    let info = client.server_info().await?;
    println!("{}", "Server Info:".bold());
    println!("  Name:    {}", info.name.cyan());
    println!("  Version: {}", info.version);
    Ok(())
}

async fn check_version(client: &BasinClient, version: &str) -> Result<()> {
    let response = client.check_version(version).await?;

    if response.compatible {
        println!(
            "{}",
            format!("Compatible with server {}", response.server_version).green()
        );
    } else {
        println!(
            "{}",
            format!("Not compatible with server {}", response.server_version).red()
        );
        if let Some(message) = response.message {
            println!("  {}", message.dimmed());
        }
    }

    Ok(())
}

async fn shutdown_server(client: &BasinClient) -> Result<()> {
    client.server_shutdown().await?;
    println!("{}", "Shutdown requested.".yellow());
    Ok(())
}

async fn teardown_server(client: &BasinClient) -> Result<()> {
    client.inform_teardown().await?;
    println!("{}", "Server torn down.".yellow());
    Ok(())
}

fn print_status(status: &ServerStatusResponse) {
    let phase = match status.phase {
        ServerPhase::Starting => "starting".yellow(),
        ServerPhase::Ready => "ready".green(),
        ServerPhase::ShuttingDown => "shutting down".red(),
    };

    println!("{}", "Server Status:".bold());
    println!("  Phase:       {}", phase);
    println!("  Active runs: {}", status.active_runs);
    println!("  Uptime:      {}s", status.uptime_seconds);
    if let Some(keepalive) = status.last_keepalive {
        println!(
            "  Last seen:   {}",
            keepalive
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }
}
