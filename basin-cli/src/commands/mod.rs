//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod artifact;
mod run;
mod server;

pub use artifact::ArtifactCommands;
pub use run::RunCommands;
pub use server::ServerCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Server lifecycle and status
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Run inspection and queries
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Artifact transfer control
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Server { command } => server::handle_server_command(command, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Artifact { command } => artifact::handle_artifact_command(command, config).await,
    }
}
