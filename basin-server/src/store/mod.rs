//! Run Store
//!
//! Disk layout and durable append-only transaction logs, one per run.
//! Every accepted record is a single JSON line; the file is flushed and
//! fsynced before the append call returns, so an acknowledged record
//! survives a process crash. Attach replays the log to rebuild the run's
//! in-memory projections.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use basin_core::domain::record::StoredRecord;
use thiserror::Error;
use uuid::Uuid;

/// Storage error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Root of the server's on-disk state
///
/// `<root>/runs/<id>.jsonl` holds run transaction logs,
/// `<root>/artifacts/<job_id>/` holds staged artifact files.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Opens (and creates if needed) the store directories
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let runs = root.join("runs");
        let artifacts = root.join("artifacts");
        std::fs::create_dir_all(&runs).map_err(|e| io_err(&runs, e))?;
        std::fs::create_dir_all(&artifacts).map_err(|e| io_err(&artifacts, e))?;
        Ok(Self { root })
    }

    fn log_path(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{run_id}.jsonl"))
    }

    /// Staging directory for one artifact transfer job
    pub fn artifact_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join("artifacts").join(job_id.to_string())
    }

    pub fn log_exists(&self, run_id: &str) -> bool {
        self.log_path(run_id).is_file()
    }

    /// Creates a fresh log for a run; fails if one already exists
    pub fn create_log(&self, run_id: &str) -> Result<RunLog, StoreError> {
        let path = self.log_path(run_id);
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        Ok(RunLog { path, file })
    }

    /// Replays an existing log and reopens it for appending
    ///
    /// Returns `None` when no log exists for the run id.
    pub fn open_log(&self, run_id: &str) -> Result<Option<(RunLog, Vec<StoredRecord>)>, StoreError> {
        let path = self.log_path(run_id);
        if !path.is_file() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path).map_err(|e| io_err(&path, e))?);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| io_err(&path, e))?;
            if line.is_empty() {
                continue;
            }
            let record =
                serde_json::from_str::<StoredRecord>(&line).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    line: idx + 1,
                    source: e,
                })?;
            records.push(record);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        Ok(Some((RunLog { path, file }, records)))
    }
}

/// Append handle for one run's transaction log
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Appends one record and makes it durable before returning
    pub fn append(&mut self, record: &StoredRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .map_err(|e| io_err(&self.path, e))?;
        self.file.sync_data().map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::domain::record::{ConfigRecord, Record};

    fn stored(num: u64, record: Record) -> StoredRecord {
        StoredRecord {
            num,
            recorded_at: chrono::Utc::now(),
            record,
        }
    }

    #[test]
    fn test_append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let mut log = store.create_log("run1").unwrap();
        let mut update = std::collections::BTreeMap::new();
        update.insert("lr".to_string(), serde_json::json!(0.1));
        log.append(&stored(1, Record::Config(ConfigRecord { update })))
            .unwrap();
        drop(log);

        let (_log, records) = store.open_log("run1").unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].num, 1);
        assert!(matches!(records[0].record, Record::Config(_)));
    }

    #[test]
    fn test_create_log_refuses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        store.create_log("run1").unwrap();
        assert!(store.create_log("run1").is_err());
    }

    #[test]
    fn test_open_log_missing_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        assert!(store.open_log("ghost").unwrap().is_none());
        assert!(!store.log_exists("ghost"));
    }

    #[test]
    fn test_replay_rejects_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let mut log = store.create_log("run1").unwrap();
        log.append(&stored(1, Record::Config(ConfigRecord::default())))
            .unwrap();
        std::fs::write(&log.path, b"{\"num\":1,\"type\":\"config\"\n").unwrap();

        match store.open_log("run1") {
            Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected corrupt record error, got {other:?}"),
        }
    }
}
