//! Artifact transfer DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement for an enqueued transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub job_id: Uuid,
}
