//! Server configuration
//!
//! Defines all configurable parameters for the sync server including
//! bind address, data directory, and artifact transfer tuning.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
///
/// All knobs are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow disks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to (e.g., "127.0.0.1:8723")
    pub bind_addr: String,

    /// Directory holding run logs and artifact staging
    pub data_dir: PathBuf,

    /// Maximum copy attempts per artifact transfer before it errors out
    pub transfer_max_attempts: u32,

    /// Backoff before the first transfer retry; doubles per attempt
    pub transfer_initial_backoff: Duration,

    /// Cap on the transfer retry backoff
    pub transfer_max_backoff: Duration,

    /// Chunk size for artifact file copies; cancellation is checked
    /// between chunks
    pub transfer_chunk_size: usize,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - BASIN_BIND_ADDR (optional, default: 127.0.0.1:8723)
    /// - BASIN_DATA_DIR (optional, default: ./basin-data)
    /// - BASIN_TRANSFER_MAX_ATTEMPTS (optional, default: 5)
    /// - BASIN_TRANSFER_INITIAL_BACKOFF_MS (optional, default: 500)
    /// - BASIN_TRANSFER_MAX_BACKOFF_MS (optional, default: 10000)
    /// - BASIN_TRANSFER_CHUNK_SIZE (optional, bytes, default: 1048576)
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("BASIN_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8723".to_string());

        let data_dir = std::env::var("BASIN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./basin-data"));

        let transfer_max_attempts = std::env::var("BASIN_TRANSFER_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let transfer_initial_backoff = std::env::var("BASIN_TRANSFER_INITIAL_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        let transfer_max_backoff = std::env::var("BASIN_TRANSFER_MAX_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));

        let transfer_chunk_size = std::env::var("BASIN_TRANSFER_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Self {
            bind_addr,
            data_dir,
            transfer_max_attempts,
            transfer_initial_backoff,
            transfer_max_backoff,
            transfer_chunk_size,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.is_empty() {
            return Err("bind_addr cannot be empty".to_string());
        }

        if self.transfer_max_attempts == 0 {
            return Err("transfer_max_attempts must be greater than 0".to_string());
        }

        if self.transfer_chunk_size == 0 {
            return Err("transfer_chunk_size must be greater than 0".to_string());
        }

        if self.transfer_initial_backoff > self.transfer_max_backoff {
            return Err("transfer_initial_backoff cannot exceed transfer_max_backoff".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8723".to_string(),
            data_dir: PathBuf::from("./basin-data"),
            transfer_max_attempts: 5,
            transfer_initial_backoff: Duration::from_millis(500),
            transfer_max_backoff: Duration::from_secs(10),
            transfer_chunk_size: 1024 * 1024,
        }
    }
}
