//! Service layer
//!
//! Business logic of the sync server, one module per component:
//! registry (run sessions), sink (record appends and queries), exit
//! (finalization state machine), transfer (async artifact uploads), and
//! lifecycle (process-wide readiness).

pub mod error;
pub mod exit;
pub mod lifecycle;
pub mod registry;
pub mod sink;
pub mod transfer;

pub use error::ServiceError;
pub use exit::ExitCoordinator;
pub use lifecycle::LifecycleController;
pub use registry::SessionRegistry;
pub use sink::RecordSink;
pub use transfer::{TransferConfig, TransferManager};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use basin_core::domain::record::{ConfigRecord, HistoryRow, Record};
    use basin_core::domain::run::{RunMetadata, RunState};
    use serde_json::json;

    use super::*;
    use crate::store::RunStore;

    /// Full run lifecycle: start, log, exit, poll to completion, query
    #[tokio::test]
    async fn test_run_lifecycle_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new(RunStore::open(dir.path()).unwrap()));
        let sink = RecordSink::new(Arc::clone(&registry));
        let exit = ExitCoordinator::new(Arc::clone(&registry));

        registry
            .start("run1", RunMetadata::default())
            .await
            .unwrap();

        let mut update = BTreeMap::new();
        update.insert("lr".to_string(), json!(0.1));
        sink.append("run1", Record::Config(ConfigRecord { update }))
            .await
            .unwrap();

        let mut items = BTreeMap::new();
        items.insert("loss".to_string(), json!(1.0));
        sink.append("run1", Record::History(HistoryRow { step: 0, items }))
            .await
            .unwrap();

        exit.run_exit("run1", 0).await.unwrap();

        let mut done = exit.poll_exit("run1").await.unwrap();
        for _ in 0..100 {
            if done.done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            done = exit.poll_exit("run1").await.unwrap();
        }
        assert!(done.done);
        assert_eq!(done.exit_code, Some(0));

        let summary = sink.get_summary("run1").await.unwrap();
        assert_eq!(summary.summary.get("loss"), Some(&json!(1.0)));

        let session = registry.get("run1").await.unwrap();
        assert_eq!(session.state.lock().await.info.state, RunState::Finished);
    }
}
