//! Basin HTTP Client
//!
//! A simple, type-safe HTTP client for communicating with the Basin sync
//! server API.
//!
//! This crate provides a unified interface for experiment processes and the
//! CLI to interact with the server, eliminating code duplication and
//! ensuring consistency.
//!
//! # Example
//!
//! ```no_run
//! use basin_client::BasinClient;
//! use basin_core::domain::run::RunMetadata;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BasinClient::new("http://localhost:8723");
//!
//!     client.inform_init().await?;
//!     let run = client.start_run("run1", RunMetadata::default()).await?;
//!
//!     println!("Started run: {}", run.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod records;
mod runs;
mod server;
mod transfers;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Basin sync server API
///
/// This client provides methods for all server endpoints, organized into
/// logical groups:
/// - Server lifecycle (inform-init through teardown, status, version)
/// - Run lifecycle (start, attach, exit, poll-exit, pause/resume)
/// - Record logging (config, summary, metrics, history, output, alerts)
/// - Artifact transfers (send, poll, cancel, release)
#[derive(Debug, Clone)]
pub struct BasinClient {
    /// Base URL of the server (e.g., "http://localhost:8723")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BasinClient {
    /// Create a new Basin client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server API (e.g., "http://localhost:8723")
    ///
    /// # Example
    /// ```
    /// use basin_client::BasinClient;
    ///
    /// let client = BasinClient::new("http://localhost:8723");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new Basin client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use basin_client::BasinClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = BasinClient::with_client("http://localhost:8723", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
