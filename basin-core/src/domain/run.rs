//! Run domain types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tracked experiment run
///
/// Structure shared between the server (persists) and clients (inspect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub state: RunState,
    pub metadata: RunMetadata,
    /// Config projection, folded from config deltas in receipt order
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Number of records accepted for this run so far
    pub record_count: u64,
    /// Set while the surrounding scheduler signalled imminent preemption
    pub preempting: bool,
    /// Set while heartbeat expectations are suspended
    pub paused: bool,
    pub exit_code: Option<i32>,
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Created,
    Running,
    Exiting,
    Finished,
}

/// User-supplied run metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub project: Option<String>,
    pub entity: Option<String>,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunMetadata {
    /// Overlay another metadata patch on top of this one
    ///
    /// Only fields present in `patch` are replaced; tags are replaced
    /// wholesale when non-empty.
    pub fn apply(&mut self, patch: RunMetadata) {
        if patch.project.is_some() {
            self.project = patch.project;
        }
        if patch.entity.is_some() {
            self.entity = patch.entity;
        }
        if patch.display_name.is_some() {
            self.display_name = patch.display_name;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        if !patch.tags.is_empty() {
            self.tags = patch.tags;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_apply_keeps_unset_fields() {
        let mut base = RunMetadata {
            project: Some("demo".to_string()),
            display_name: Some("first".to_string()),
            ..Default::default()
        };

        base.apply(RunMetadata {
            display_name: Some("renamed".to_string()),
            ..Default::default()
        });

        assert_eq!(base.project.as_deref(), Some("demo"));
        assert_eq!(base.display_name.as_deref(), Some("renamed"));
    }
}
