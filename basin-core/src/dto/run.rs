//! Run lifecycle DTOs

use serde::{Deserialize, Serialize};

use crate::domain::run::RunMetadata;

/// Request to start (register) a new run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub run_id: String,
    #[serde(default)]
    pub metadata: RunMetadata,
}

/// Request to attach to (or detach from) an existing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachRequest {
    pub run_id: String,
}

/// Metadata patch for a running run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRunRequest {
    pub metadata: RunMetadata,
}

/// Request to begin run finalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExitRequest {
    pub exit_code: i32,
}

/// Answer to a PollExit call
///
/// `done` is monotonic: once true it stays true and `exit_code` never
/// changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollExitResponse {
    pub done: bool,
    pub exit_code: Option<i32>,
}
