//! Server lifecycle and process-control DTOs

use serde::{Deserialize, Serialize};

/// Process-wide readiness phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerPhase {
    /// Process is up but InformInit has not been received yet
    Starting,
    Ready,
    /// Terminal; entered on InformTeardown
    ShuttingDown,
}

/// Answer to a ServerStatus call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatusResponse {
    pub phase: ServerPhase,
    pub active_runs: usize,
    pub uptime_seconds: u64,
    pub last_keepalive: Option<chrono::DateTime<chrono::Utc>>,
}

/// Answer to a ServerInfo call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfoResponse {
    pub name: String,
    pub version: String,
}

/// Client/server compatibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckVersionRequest {
    pub client_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckVersionResponse {
    pub compatible: bool,
    pub server_version: String,
    pub message: Option<String>,
}
