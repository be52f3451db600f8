//! Configuration module
//!
//! Handles CLI configuration including the sync server URL.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the sync server
    pub server_url: String,
}
