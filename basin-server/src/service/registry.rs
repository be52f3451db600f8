//! Session Registry
//!
//! Tracks active run sessions by identifier. Each session owns the run's
//! transaction log and in-memory projections, guarded by one async mutex so
//! calls for the same run are serialized while distinct runs proceed in
//! parallel. Detach drops the in-memory session only; a later attach replays
//! the log and restores it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use basin_core::domain::record::{
    HistoryRow, MetricRecord, Record, RunRecord, StoredRecord,
};
use basin_core::domain::run::{RunInfo, RunMetadata, RunState};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::service::error::ServiceError;
use crate::store::{RunLog, RunStore};

const MAX_RUN_ID_LEN: usize = 128;

/// One active run session
pub struct RunSession {
    pub id: String,
    pub state: Mutex<SessionState>,
}

/// Exit state machine for a run
///
/// `Running -> ExitRequested -> Exited`; Exited is terminal and the exit
/// code never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Running,
    ExitRequested { exit_code: i32 },
    Exited { exit_code: i32 },
}

/// A partial history row still accumulating values
#[derive(Debug, Clone)]
pub struct OpenRow {
    pub step: i64,
    pub items: BTreeMap<String, Value>,
}

/// Mutable per-run state behind the session mutex
pub struct SessionState {
    log: RunLog,
    next_num: u64,
    pub info: RunInfo,
    pub exit: ExitState,
    pub summary: BTreeMap<String, Value>,
    pub metrics: HashMap<String, MetricRecord>,
    pub history: Vec<HistoryRow>,
    pub open_row: Option<OpenRow>,
}

impl SessionState {
    fn new(run_id: &str, log: RunLog) -> Self {
        Self {
            log,
            next_num: 1,
            info: RunInfo {
                id: run_id.to_string(),
                state: RunState::Created,
                metadata: RunMetadata::default(),
                config: BTreeMap::new(),
                created_at: chrono::Utc::now(),
                finished_at: None,
                record_count: 0,
                preempting: false,
                paused: false,
                exit_code: None,
            },
            exit: ExitState::Running,
            summary: BTreeMap::new(),
            metrics: HashMap::new(),
            history: Vec::new(),
            open_row: None,
        }
    }

    /// Checks a record before it is accepted; a rejected record has no
    /// observable side effect
    pub fn validate(&self, record: &Record) -> Result<(), ServiceError> {
        match record {
            Record::Metric(metric) => {
                if metric.name.is_empty() {
                    return Err(ServiceError::InvalidArgument(
                        "metric name cannot be empty".to_string(),
                    ));
                }
                if let Some(axis) = &metric.step_metric {
                    if axis != "_step" && !self.metrics.contains_key(axis) {
                        return Err(ServiceError::InvalidArgument(format!(
                            "metric {} references undefined step axis {}",
                            metric.name, axis
                        )));
                    }
                }
            }
            Record::History(row) if row.step < 0 => {
                return Err(ServiceError::InvalidArgument(format!(
                    "history step cannot be negative (got {})",
                    row.step
                )));
            }
            Record::PartialHistory(row) if row.step < 0 => {
                return Err(ServiceError::InvalidArgument(format!(
                    "history step cannot be negative (got {})",
                    row.step
                )));
            }
            Record::Alert(alert) if alert.title.is_empty() => {
                return Err(ServiceError::InvalidArgument(
                    "alert title cannot be empty".to_string(),
                ));
            }
            Record::Artifact(artifact) => {
                if artifact.name.is_empty() || artifact.digest.is_empty() {
                    return Err(ServiceError::InvalidArgument(
                        "artifact records require a name and a digest".to_string(),
                    ));
                }
            }
            Record::LinkArtifact(link) => {
                if link.artifact_name.is_empty() || link.portfolio.is_empty() {
                    return Err(ServiceError::InvalidArgument(
                        "artifact links require an artifact name and a portfolio".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Persists a record to the transaction log, then folds it into the
    /// projections. Returns the assigned sequence number.
    pub fn persist_and_apply(&mut self, record: Record) -> Result<u64, ServiceError> {
        let stored = StoredRecord {
            num: self.next_num,
            recorded_at: chrono::Utc::now(),
            record,
        };
        self.log.append(&stored)?;
        self.next_num += 1;
        let StoredRecord {
            num,
            recorded_at,
            record,
        } = stored;
        self.apply(record, recorded_at);
        Ok(num)
    }

    /// Folds one record into the projections
    ///
    /// Also used for replay on attach, so this must stay free of I/O and
    /// produce the same state live and replayed; timestamps come from the
    /// record, not the clock.
    pub fn apply(&mut self, record: Record, recorded_at: chrono::DateTime<chrono::Utc>) {
        let first = self.info.record_count == 0;
        self.info.record_count += 1;
        match record {
            Record::Run(run) => {
                if first {
                    self.info.created_at = recorded_at;
                }
                self.info.metadata.apply(run.metadata);
                if self.info.state == RunState::Created {
                    self.info.state = RunState::Running;
                }
            }
            Record::Config(config) => {
                merge_update(&mut self.info.config, config.update);
            }
            Record::Summary(summary) => {
                merge_update(&mut self.summary, summary.update);
            }
            Record::Metric(metric) => {
                self.metrics.insert(metric.name.clone(), metric);
            }
            Record::History(row) => {
                self.flush_open_row();
                self.push_history_row(row);
            }
            Record::PartialHistory(partial) => {
                match &mut self.open_row {
                    Some(open) if open.step == partial.step => {
                        open.items.extend(partial.items);
                    }
                    Some(_) => {
                        // A different step closes the accumulating row as-is
                        self.flush_open_row();
                        self.open_row = Some(OpenRow {
                            step: partial.step,
                            items: partial.items,
                        });
                    }
                    None => {
                        self.open_row = Some(OpenRow {
                            step: partial.step,
                            items: partial.items,
                        });
                    }
                }
                if partial.flush {
                    self.flush_open_row();
                }
            }
            Record::Exit(exit) => {
                self.flush_open_row();
                self.exit = ExitState::Exited {
                    exit_code: exit.exit_code,
                };
                self.info.state = RunState::Finished;
                self.info.finished_at = Some(recorded_at);
                self.info.exit_code = Some(exit.exit_code);
            }
            // Persisted for the record sequence; no projection to update
            Record::Files(_)
            | Record::Output(_)
            | Record::OutputRaw(_)
            | Record::Alert(_)
            | Record::Telemetry(_)
            | Record::Artifact(_)
            | Record::LinkArtifact(_) => {}
        }
    }

    /// Closes the open partial row, folding it into history and summary
    pub fn flush_open_row(&mut self) {
        if let Some(open) = self.open_row.take() {
            self.push_history_row(HistoryRow {
                step: open.step,
                items: open.items,
            });
        }
    }

    fn push_history_row(&mut self, row: HistoryRow) {
        for (key, value) in &row.items {
            self.summary.insert(key.clone(), value.clone());
        }
        self.history.push(row);
    }
}

/// Merges a delta into a projection map; `null` deletes the key
fn merge_update(target: &mut BTreeMap<String, Value>, update: BTreeMap<String, Value>) {
    for (key, value) in update {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Registry of active run sessions
pub struct SessionRegistry {
    store: RunStore,
    runs: RwLock<HashMap<String, Arc<RunSession>>>,
}

impl SessionRegistry {
    pub fn new(store: RunStore) -> Self {
        Self {
            store,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new run and writes its first log record
    ///
    /// Fails with AlreadyExists when the run is active or a log for the id
    /// is already on disk (attach instead).
    pub async fn start(
        &self,
        run_id: &str,
        metadata: RunMetadata,
    ) -> Result<RunInfo, ServiceError> {
        validate_run_id(run_id)?;

        let mut runs = self.runs.write().await;
        if runs.contains_key(run_id) || self.store.log_exists(run_id) {
            return Err(ServiceError::RunAlreadyExists(run_id.to_string()));
        }

        let log = self.store.create_log(run_id)?;
        let mut state = SessionState::new(run_id, log);
        state.persist_and_apply(Record::Run(RunRecord {
            run_id: run_id.to_string(),
            metadata,
        }))?;

        let info = state.info.clone();
        runs.insert(
            run_id.to_string(),
            Arc::new(RunSession {
                id: run_id.to_string(),
                state: Mutex::new(state),
            }),
        );

        tracing::info!("Run started: {}", run_id);
        Ok(info)
    }

    /// Attaches to an active run, or replays a persisted one
    ///
    /// Idempotent: attaching to an already-active run returns its current
    /// info without touching the session.
    pub async fn attach(&self, run_id: &str) -> Result<RunInfo, ServiceError> {
        validate_run_id(run_id)?;

        let mut runs = self.runs.write().await;
        if let Some(session) = runs.get(run_id) {
            return Ok(session.state.lock().await.info.clone());
        }

        let Some((log, records)) = self.store.open_log(run_id)? else {
            return Err(ServiceError::RunNotFound(run_id.to_string()));
        };

        let mut state = SessionState::new(run_id, log);
        let replayed = records.len();
        for stored in records {
            state.next_num = state.next_num.max(stored.num + 1);
            state.apply(stored.record, stored.recorded_at);
        }

        let info = state.info.clone();
        runs.insert(
            run_id.to_string(),
            Arc::new(RunSession {
                id: run_id.to_string(),
                state: Mutex::new(state),
            }),
        );

        tracing::info!("Run attached: {} ({} records replayed)", run_id, replayed);
        Ok(info)
    }

    /// Drops the in-memory session; the run's data stays on disk
    pub async fn detach(&self, run_id: &str) -> Result<(), ServiceError> {
        let mut runs = self.runs.write().await;
        if runs.remove(run_id).is_none() {
            return Err(ServiceError::RunNotFound(run_id.to_string()));
        }
        tracing::info!("Run detached: {}", run_id);
        Ok(())
    }

    /// Fetches an active session
    pub async fn get(&self, run_id: &str) -> Result<Arc<RunSession>, ServiceError> {
        let runs = self.runs.read().await;
        runs.get(run_id)
            .cloned()
            .ok_or_else(|| ServiceError::RunNotFound(run_id.to_string()))
    }

    /// Applies a metadata patch and persists it as a run record
    pub async fn update_run(
        &self,
        run_id: &str,
        metadata: RunMetadata,
    ) -> Result<RunInfo, ServiceError> {
        let session = self.get(run_id).await?;
        let mut state = session.state.lock().await;
        state.persist_and_apply(Record::Run(RunRecord {
            run_id: run_id.to_string(),
            metadata,
        }))?;
        Ok(state.info.clone())
    }

    /// Flags the run as about to be preempted by its scheduler
    pub async fn set_preempting(&self, run_id: &str, preempting: bool) -> Result<(), ServiceError> {
        let session = self.get(run_id).await?;
        session.state.lock().await.info.preempting = preempting;
        Ok(())
    }

    /// Suspends or resumes heartbeat expectations for the run
    pub async fn set_paused(&self, run_id: &str, paused: bool) -> Result<(), ServiceError> {
        let session = self.get(run_id).await?;
        session.state.lock().await.info.paused = paused;
        Ok(())
    }

    /// Current info for all active runs
    pub async fn list(&self) -> Vec<RunInfo> {
        let sessions: Vec<Arc<RunSession>> = self.runs.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.state.lock().await.info.clone());
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn active_count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Detaches every active session
    pub async fn shutdown(&self) {
        let mut runs = self.runs.write().await;
        let count = runs.len();
        runs.clear();
        if count > 0 {
            tracing::info!("Detached {} active run(s)", count);
        }
    }
}

/// Run ids become file names; restrict them accordingly
fn validate_run_id(run_id: &str) -> Result<(), ServiceError> {
    if run_id.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "run id cannot be empty".to_string(),
        ));
    }
    if run_id.len() > MAX_RUN_ID_LEN {
        return Err(ServiceError::InvalidArgument(format!(
            "run id cannot exceed {MAX_RUN_ID_LEN} characters"
        )));
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ServiceError::InvalidArgument(
            "run id may only contain alphanumerics, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::domain::record::{ConfigRecord, ExitRecord, SummaryRecord};

    fn registry(dir: &tempfile::TempDir) -> SessionRegistry {
        SessionRegistry::new(RunStore::open(dir.path()).unwrap())
    }

    fn config_update(key: &str, value: Value) -> Record {
        let mut update = BTreeMap::new();
        update.insert(key.to_string(), value);
        Record::Config(ConfigRecord { update })
    }

    #[tokio::test]
    async fn test_start_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry.start("run1", RunMetadata::default()).await.unwrap();
        assert!(matches!(
            registry.start("run1", RunMetadata::default()).await,
            Err(ServiceError::RunAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_bad_ids() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        let too_long = "x".repeat(200);
        for bad in ["", "a/b", "../escape", too_long.as_str()] {
            assert!(matches!(
                registry.start(bad, RunMetadata::default()).await,
                Err(ServiceError::InvalidArgument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_attach_unknown_run() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        assert!(matches!(
            registry.attach("ghost").await,
            Err(ServiceError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry.start("run1", RunMetadata::default()).await.unwrap();
        let first = registry.attach("run1").await.unwrap();
        let second = registry.attach("run1").await.unwrap();
        assert_eq!(first.record_count, second.record_count);
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_detach_then_attach_replays_state() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry.start("run1", RunMetadata::default()).await.unwrap();
        {
            let session = registry.get("run1").await.unwrap();
            let mut state = session.state.lock().await;
            state
                .persist_and_apply(config_update("lr", serde_json::json!(0.1)))
                .unwrap();
            let mut update = BTreeMap::new();
            update.insert("best".to_string(), serde_json::json!(0.9));
            state
                .persist_and_apply(Record::Summary(SummaryRecord { update }))
                .unwrap();
            state
                .persist_and_apply(Record::Exit(ExitRecord { exit_code: 3 }))
                .unwrap();
        }

        registry.detach("run1").await.unwrap();
        assert!(matches!(
            registry.get("run1").await,
            Err(ServiceError::RunNotFound(_))
        ));

        let info = registry.attach("run1").await.unwrap();
        assert_eq!(info.state, RunState::Finished);
        assert_eq!(info.exit_code, Some(3));
        assert_eq!(info.record_count, 4);

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert_eq!(state.info.config.get("lr"), Some(&serde_json::json!(0.1)));
        assert_eq!(state.summary.get("best"), Some(&serde_json::json!(0.9)));
        assert_eq!(state.exit, ExitState::Exited { exit_code: 3 });
    }

    #[tokio::test]
    async fn test_start_over_persisted_run_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry.start("run1", RunMetadata::default()).await.unwrap();
        registry.detach("run1").await.unwrap();

        // The log survives detach, so a fresh Start must refuse
        assert!(matches!(
            registry.start("run1", RunMetadata::default()).await,
            Err(ServiceError::RunAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_update_run_metadata_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry
            .start(
                "run1",
                RunMetadata {
                    project: Some("demo".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        registry
            .update_run(
                "run1",
                RunMetadata {
                    display_name: Some("tuned".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        registry.detach("run1").await.unwrap();
        let info = registry.attach("run1").await.unwrap();
        assert_eq!(info.metadata.project.as_deref(), Some("demo"));
        assert_eq!(info.metadata.display_name.as_deref(), Some("tuned"));
    }

    #[tokio::test]
    async fn test_shutdown_detaches_all() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        registry.start("run1", RunMetadata::default()).await.unwrap();
        registry.start("run2", RunMetadata::default()).await.unwrap();
        assert_eq!(registry.list().await.len(), 2);

        registry.shutdown().await;
        assert_eq!(registry.active_count().await, 0);
    }
}
