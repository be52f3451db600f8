//! Artifact transfer domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to transfer: a named artifact and its backing files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSpec {
    pub artifact_name: String,
    pub artifact_type: Option<String>,
    /// Run the artifact is logged against, if any
    pub run_id: Option<String>,
    pub files: Vec<TransferFile>,
}

/// One file within a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFile {
    /// Absolute source path on the machine running the server
    pub source: String,
    /// Logical name inside the artifact
    pub name: String,
}

/// Transfer job state machine
///
/// `Pending -> InProgress -> {Done, Error}`, with `Cancelled` reachable from
/// the two non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Pending,
    InProgress,
    Done,
    Cancelled,
    Error,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferState::Done | TransferState::Cancelled | TransferState::Error
        )
    }
}

/// Bytes and files moved so far
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransferProgress {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub files_done: usize,
    pub files_total: usize,
}

/// Snapshot of one transfer job as returned by Poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferJob {
    pub id: Uuid,
    pub artifact_name: String,
    pub state: TransferState,
    pub progress: TransferProgress,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TransferState::Pending.is_terminal());
        assert!(!TransferState::InProgress.is_terminal());
        assert!(TransferState::Done.is_terminal());
        assert!(TransferState::Cancelled.is_terminal());
        assert!(TransferState::Error.is_terminal());
    }
}
