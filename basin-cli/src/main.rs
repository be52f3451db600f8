//! Basin CLI
//!
//! Command-line interface for inspecting and controlling a Basin sync server.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "basin")]
#[command(about = "Basin experiment-tracking sync server CLI", long_about = None)]
struct Cli {
    /// Sync server URL
    #[arg(long, env = "BASIN_SERVER_URL", default_value = "http://localhost:8723")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
