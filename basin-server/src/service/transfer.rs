//! Async Artifact Transfer Manager
//!
//! Owns the transfer job state machine `Pending -> InProgress -> {Done,
//! Error}` with `Cancelled` reachable from the non-terminal states. Send
//! enqueues a background copy into the artifact staging area and returns a
//! job id immediately; Poll returns the current snapshot without blocking.
//! Transient copy failures retry with bounded exponential backoff;
//! cancellation is checked between chunks so a Cancel is observable by the
//! next Poll within one scheduling quantum.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use basin_core::domain::transfer::{
    TransferJob, TransferProgress, TransferSpec, TransferState,
};
use basin_core::dto::transfer::SendResponse;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::service::error::ServiceError;

/// Retry and copy tuning for transfers
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            chunk_size: 1024 * 1024,
        }
    }
}

struct TransferInner {
    state: TransferState,
    progress: TransferProgress,
    error: Option<String>,
}

struct TransferHandle {
    id: Uuid,
    spec: TransferSpec,
    created_at: chrono::DateTime<chrono::Utc>,
    cancelled: AtomicBool,
    inner: Mutex<TransferInner>,
}

impl TransferHandle {
    fn new(id: Uuid, spec: TransferSpec) -> Self {
        let files_total = spec.files.len();
        Self {
            id,
            spec,
            created_at: chrono::Utc::now(),
            cancelled: AtomicBool::new(false),
            inner: Mutex::new(TransferInner {
                state: TransferState::Pending,
                progress: TransferProgress {
                    files_total,
                    ..Default::default()
                },
                error: None,
            }),
        }
    }

    fn snapshot(&self) -> TransferJob {
        let inner = self.inner.lock().unwrap();
        TransferJob {
            id: self.id,
            artifact_name: self.spec.artifact_name.clone(),
            state: inner.state,
            progress: inner.progress,
            error: inner.error.clone(),
            created_at: self.created_at,
        }
    }

    /// Pending -> InProgress; false when the job turned terminal already
    fn begin(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = TransferState::InProgress;
        true
    }

    fn complete(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.is_terminal() {
            inner.state = TransferState::Done;
        }
    }

    fn fail(&self, cause: String) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.is_terminal() {
            inner.state = TransferState::Error;
            inner.error = Some(cause);
        }
    }

    fn set_total_bytes(&self, bytes: u64) {
        self.inner.lock().unwrap().progress.bytes_total = bytes;
    }

    fn add_bytes(&self, n: u64) {
        self.inner.lock().unwrap().progress.bytes_done += n;
    }

    fn file_done(&self) {
        self.inner.lock().unwrap().progress.files_done += 1;
    }

    fn reset_progress(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.progress.bytes_done = 0;
        inner.progress.files_done = 0;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct TransferManager {
    staging_root: PathBuf,
    config: TransferConfig,
    jobs: Mutex<HashMap<Uuid, Arc<TransferHandle>>>,
}

impl TransferManager {
    pub fn new(staging_root: PathBuf, config: TransferConfig) -> Self {
        Self {
            staging_root,
            config,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueues a transfer and returns its job id immediately
    pub fn send(&self, spec: TransferSpec) -> Result<SendResponse, ServiceError> {
        validate_spec(&spec)?;

        let job_id = Uuid::new_v4();
        let handle = Arc::new(TransferHandle::new(job_id, spec));
        self.jobs.lock().unwrap().insert(job_id, Arc::clone(&handle));

        let dest_dir = self.staging_root.join(job_id.to_string());
        let config = self.config.clone();
        tracing::info!(
            "Transfer {} enqueued ({} file(s) for artifact {})",
            job_id,
            handle.spec.files.len(),
            handle.spec.artifact_name
        );
        tokio::spawn(run_transfer(handle, dest_dir, config));

        Ok(SendResponse { job_id })
    }

    /// Current snapshot; NotFound once the job was released
    pub fn poll(&self, job_id: Uuid) -> Result<TransferJob, ServiceError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(&job_id)
            .map(|handle| handle.snapshot())
            .ok_or(ServiceError::TransferNotFound(job_id))
    }

    /// Cancels a pending or in-progress job; no-op once terminal
    pub fn cancel(&self, job_id: Uuid) -> Result<(), ServiceError> {
        let jobs = self.jobs.lock().unwrap();
        let handle = jobs
            .get(&job_id)
            .ok_or(ServiceError::TransferNotFound(job_id))?;

        handle.cancelled.store(true, Ordering::SeqCst);
        let mut inner = handle.inner.lock().unwrap();
        if !inner.state.is_terminal() {
            inner.state = TransferState::Cancelled;
            tracing::info!("Transfer {} cancelled", job_id);
        }
        Ok(())
    }

    /// Frees job bookkeeping; any later call for the id is NotFound
    pub fn release(&self, job_id: Uuid) -> Result<(), ServiceError> {
        let removed = self.jobs.lock().unwrap().remove(&job_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(ServiceError::TransferNotFound(job_id)),
        }
    }
}

fn validate_spec(spec: &TransferSpec) -> Result<(), ServiceError> {
    if spec.artifact_name.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "artifact name cannot be empty".to_string(),
        ));
    }
    if spec.files.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "transfer spec must name at least one file".to_string(),
        ));
    }
    for file in &spec.files {
        if file.source.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "transfer file source cannot be empty".to_string(),
            ));
        }
        if file.name.is_empty()
            || file.name.contains('/')
            || file.name.contains('\\')
            || file.name == ".."
        {
            return Err(ServiceError::InvalidArgument(format!(
                "invalid transfer file name: {:?}",
                file.name
            )));
        }
    }
    Ok(())
}

enum CopyOutcome {
    Complete,
    Cancelled,
}

/// Background worker for one transfer job
async fn run_transfer(handle: Arc<TransferHandle>, dest_dir: PathBuf, config: TransferConfig) {
    if !handle.begin() {
        return;
    }

    let mut backoff = config.initial_backoff;
    for attempt in 1..=config.max_attempts {
        if handle.is_cancelled() {
            return;
        }

        match copy_files(&handle, &dest_dir, config.chunk_size).await {
            Ok(CopyOutcome::Complete) => {
                handle.complete();
                tracing::info!("Transfer {} complete", handle.id);
                return;
            }
            Ok(CopyOutcome::Cancelled) => return,
            Err(e) => {
                if attempt == config.max_attempts {
                    tracing::error!(
                        "Transfer {} failed permanently after {} attempt(s): {}",
                        handle.id,
                        attempt,
                        e
                    );
                    handle.fail(format!("{e} (after {attempt} attempt(s))"));
                    return;
                }

                tracing::warn!(
                    "Transfer {} attempt {}/{} failed: {}; retrying in {:?}",
                    handle.id,
                    attempt,
                    config.max_attempts,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
                handle.reset_progress();
            }
        }
    }
}

/// Copies every file in the spec into the staging directory
async fn copy_files(
    handle: &TransferHandle,
    dest_dir: &Path,
    chunk_size: usize,
) -> std::io::Result<CopyOutcome> {
    tokio::fs::create_dir_all(dest_dir).await?;

    let mut total = 0u64;
    for file in &handle.spec.files {
        total += tokio::fs::metadata(&file.source).await?.len();
    }
    handle.set_total_bytes(total);

    let mut buf = vec![0u8; chunk_size];
    for file in &handle.spec.files {
        let mut src = tokio::fs::File::open(&file.source).await?;
        let mut dest = tokio::fs::File::create(dest_dir.join(&file.name)).await?;

        loop {
            if handle.is_cancelled() {
                return Ok(CopyOutcome::Cancelled);
            }
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dest.write_all(&buf[..n]).await?;
            handle.add_bytes(n as u64);
        }

        dest.sync_all().await?;
        handle.file_done();
    }

    Ok(CopyOutcome::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::domain::transfer::TransferFile;

    fn fast_config() -> TransferConfig {
        TransferConfig {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            chunk_size: 8,
        }
    }

    fn spec_for(name: &str, files: Vec<TransferFile>) -> TransferSpec {
        TransferSpec {
            artifact_name: name.to_string(),
            artifact_type: Some("dataset".to_string()),
            run_id: None,
            files,
        }
    }

    fn file(source: &Path, name: &str) -> TransferFile {
        TransferFile {
            source: source.to_string_lossy().into_owned(),
            name: name.to_string(),
        }
    }

    async fn poll_until_terminal(manager: &TransferManager, job_id: Uuid) -> TransferJob {
        for _ in 0..500 {
            let job = manager.poll(job_id).unwrap();
            if job.state.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transfer {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_send_copies_files_into_staging() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("weights.bin");
        std::fs::write(&source, b"0123456789abcdef0123456789").unwrap();

        let staging = dir.path().join("staging");
        let manager = TransferManager::new(staging.clone(), fast_config());

        let job_id = manager
            .send(spec_for("model", vec![file(&source, "weights.bin")]))
            .unwrap()
            .job_id;

        // An immediate poll sees a live or already-finished job, never an error
        let early = manager.poll(job_id).unwrap();
        assert_ne!(early.state, TransferState::Error);
        assert_ne!(early.state, TransferState::Cancelled);

        let job = poll_until_terminal(&manager, job_id).await;
        assert_eq!(job.state, TransferState::Done);
        assert_eq!(job.progress.bytes_done, 26);
        assert_eq!(job.progress.bytes_total, 26);
        assert_eq!(job.progress.files_done, 1);

        let staged = staging.join(job_id.to_string()).join("weights.bin");
        assert_eq!(
            std::fs::read(staged).unwrap(),
            b"0123456789abcdef0123456789"
        );
    }

    #[tokio::test]
    async fn test_missing_source_errors_after_bounded_retries() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TransferManager::new(dir.path().join("staging"), fast_config());

        let missing = dir.path().join("nope.bin");
        let job_id = manager
            .send(spec_for("model", vec![file(&missing, "nope.bin")]))
            .unwrap()
            .job_id;

        let job = poll_until_terminal(&manager, job_id).await;
        assert_eq!(job.state, TransferState::Error);
        let cause = job.error.unwrap();
        assert!(cause.contains("2 attempt(s)"), "unexpected cause: {cause}");
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        // Long backoff keeps the job retrying while we cancel it
        let config = TransferConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30),
            chunk_size: 8,
        };
        let manager = TransferManager::new(dir.path().join("staging"), config);

        let missing = dir.path().join("nope.bin");
        let job_id = manager
            .send(spec_for("model", vec![file(&missing, "nope.bin")]))
            .unwrap()
            .job_id;

        manager.cancel(job_id).unwrap();
        assert_eq!(manager.poll(job_id).unwrap().state, TransferState::Cancelled);

        // Second cancel on a terminal job is a quiet no-op
        manager.cancel(job_id).unwrap();
        assert_eq!(manager.poll(job_id).unwrap().state, TransferState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_after_done_keeps_done() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("small.txt");
        std::fs::write(&source, b"ok").unwrap();
        let manager = TransferManager::new(dir.path().join("staging"), fast_config());

        let job_id = manager
            .send(spec_for("model", vec![file(&source, "small.txt")]))
            .unwrap()
            .job_id;
        poll_until_terminal(&manager, job_id).await;

        manager.cancel(job_id).unwrap();
        assert_eq!(manager.poll(job_id).unwrap().state, TransferState::Done);
    }

    #[tokio::test]
    async fn test_release_frees_bookkeeping() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("small.txt");
        std::fs::write(&source, b"ok").unwrap();
        let manager = TransferManager::new(dir.path().join("staging"), fast_config());

        let job_id = manager
            .send(spec_for("model", vec![file(&source, "small.txt")]))
            .unwrap()
            .job_id;
        poll_until_terminal(&manager, job_id).await;

        manager.release(job_id).unwrap();
        assert!(matches!(
            manager.poll(job_id),
            Err(ServiceError::TransferNotFound(_))
        ));
        assert!(matches!(
            manager.release(job_id),
            Err(ServiceError::TransferNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TransferManager::new(dir.path().join("staging"), fast_config());

        let ghost = Uuid::new_v4();
        assert!(matches!(
            manager.poll(ghost),
            Err(ServiceError::TransferNotFound(_))
        ));
        assert!(matches!(
            manager.cancel(ghost),
            Err(ServiceError::TransferNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_spec_validation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TransferManager::new(dir.path().join("staging"), fast_config());
        let source = dir.path().join("small.txt");

        let empty = spec_for("model", vec![]);
        assert!(matches!(
            manager.send(empty),
            Err(ServiceError::InvalidArgument(_))
        ));

        let escaping = spec_for("model", vec![file(&source, "../escape")]);
        assert!(matches!(
            manager.send(escaping),
            Err(ServiceError::InvalidArgument(_))
        ));

        let unnamed = TransferSpec {
            artifact_name: String::new(),
            artifact_type: None,
            run_id: None,
            files: vec![file(&source, "small.txt")],
        };
        assert!(matches!(
            manager.send(unnamed),
            Err(ServiceError::InvalidArgument(_))
        ));
    }
}
