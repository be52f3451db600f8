//! Exit/Poll Coordinator
//!
//! Drives the per-run exit state machine `Running -> ExitRequested ->
//! Exited`. RunExit returns immediately and finalization happens in a
//! spawned task: the open partial history row is flushed and a terminal
//! exit record is written to the log. PollExit never blocks and is
//! monotonic once it reports done.

use std::sync::Arc;

use basin_core::domain::record::{ExitRecord, Record};
use basin_core::domain::run::RunState;
use basin_core::dto::run::PollExitResponse;

use crate::service::error::ServiceError;
use crate::service::registry::{ExitState, RunSession, SessionRegistry};

#[derive(Clone)]
pub struct ExitCoordinator {
    registry: Arc<SessionRegistry>,
}

impl ExitCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Begins run finalization; idempotent once requested
    pub async fn run_exit(&self, run_id: &str, exit_code: i32) -> Result<(), ServiceError> {
        let session = self.registry.get(run_id).await?;

        {
            let mut state = session.state.lock().await;
            match state.exit {
                // Repeat exits keep the first requested code
                ExitState::ExitRequested { .. } | ExitState::Exited { .. } => return Ok(()),
                ExitState::Running => {
                    state.exit = ExitState::ExitRequested { exit_code };
                    state.info.state = RunState::Exiting;
                }
            }
        }

        tracing::info!("Run {} exiting with code {}", run_id, exit_code);
        tokio::spawn(finalize(session, exit_code));
        Ok(())
    }

    /// Current exit status; done=false until finalization completed
    pub async fn poll_exit(&self, run_id: &str) -> Result<PollExitResponse, ServiceError> {
        let session = self.registry.get(run_id).await?;
        let state = session.state.lock().await;
        let response = match state.exit {
            ExitState::Running | ExitState::ExitRequested { .. } => PollExitResponse {
                done: false,
                exit_code: None,
            },
            ExitState::Exited { exit_code } => PollExitResponse {
                done: true,
                exit_code: Some(exit_code),
            },
        };
        Ok(response)
    }
}

/// Flushes pending sink state and writes the terminal exit record
async fn finalize(session: Arc<RunSession>, exit_code: i32) {
    let mut state = session.state.lock().await;
    match state.persist_and_apply(Record::Exit(ExitRecord { exit_code })) {
        Ok(_) => {
            tracing::info!("Run {} finalized with exit code {}", session.id, exit_code);
        }
        Err(e) => {
            // Mark the run exited anyway so pollers converge; the exit
            // record is missing from the log and attach will not see it
            tracing::error!("Failed to finalize run {}: {}", session.id, e);
            state.flush_open_row();
            state.exit = ExitState::Exited { exit_code };
            state.info.state = RunState::Finished;
            state.info.exit_code = Some(exit_code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::domain::record::PartialHistoryRecord;
    use basin_core::domain::run::RunMetadata;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::store::RunStore;

    async fn coordinator(dir: &tempfile::TempDir) -> (Arc<SessionRegistry>, ExitCoordinator) {
        let registry = Arc::new(SessionRegistry::new(RunStore::open(dir.path()).unwrap()));
        registry.start("run1", RunMetadata::default()).await.unwrap();
        let exit = ExitCoordinator::new(Arc::clone(&registry));
        (registry, exit)
    }

    async fn poll_until_done(exit: &ExitCoordinator, run_id: &str) -> PollExitResponse {
        for _ in 0..100 {
            let response = exit.poll_exit(run_id).await.unwrap();
            if response.done {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} never finalized");
    }

    #[tokio::test]
    async fn test_poll_exit_unknown_run() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, exit) = coordinator(&dir).await;

        assert!(matches!(
            exit.poll_exit("ghost").await,
            Err(ServiceError::RunNotFound(_))
        ));
        assert!(matches!(
            exit.run_exit("ghost", 0).await,
            Err(ServiceError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_poll_before_exit_not_done() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, exit) = coordinator(&dir).await;

        let response = exit.poll_exit("run1").await.unwrap();
        assert!(!response.done);
        assert_eq!(response.exit_code, None);
    }

    #[tokio::test]
    async fn test_exit_then_poll_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, exit) = coordinator(&dir).await;

        exit.run_exit("run1", 0).await.unwrap();
        let done = poll_until_done(&exit, "run1").await;
        assert_eq!(done.exit_code, Some(0));

        // Once done, every later poll reports the same terminal answer
        for _ in 0..5 {
            let again = exit.poll_exit("run1").await.unwrap();
            assert!(again.done);
            assert_eq!(again.exit_code, Some(0));
        }
    }

    #[tokio::test]
    async fn test_repeat_exit_keeps_first_code() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, exit) = coordinator(&dir).await;

        exit.run_exit("run1", 7).await.unwrap();
        exit.run_exit("run1", 9).await.unwrap();

        let done = poll_until_done(&exit, "run1").await;
        assert_eq!(done.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_finalize_flushes_open_partial_row() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, exit) = coordinator(&dir).await;

        {
            let session = registry.get("run1").await.unwrap();
            let mut state = session.state.lock().await;
            let mut items = BTreeMap::new();
            items.insert("loss".to_string(), serde_json::json!(0.42));
            state
                .persist_and_apply(Record::PartialHistory(PartialHistoryRecord {
                    step: 3,
                    items,
                    flush: false,
                }))
                .unwrap();
        }

        exit.run_exit("run1", 0).await.unwrap();
        poll_until_done(&exit, "run1").await;

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert!(state.open_row.is_none());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.summary.get("loss"), Some(&serde_json::json!(0.42)));
        assert_eq!(state.info.state, RunState::Finished);
    }
}
