//! Record domain types
//!
//! A record is one unit of data appended to a run. Records are persisted in
//! receipt order in the run's transaction log; the server folds them into
//! queryable projections (config, summary, history).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record as received by the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Marks run creation or a metadata update; first line of every run log
    Run(RunRecord),
    Config(ConfigRecord),
    Summary(SummaryRecord),
    Metric(MetricRecord),
    History(HistoryRow),
    PartialHistory(PartialHistoryRecord),
    Files(FilesRecord),
    Output(OutputRecord),
    OutputRaw(OutputRecord),
    Alert(AlertRecord),
    Telemetry(TelemetryRecord),
    Artifact(ArtifactRecord),
    LinkArtifact(LinkArtifactRecord),
    /// Terminal record written when run finalization completes
    Exit(ExitRecord),
}

impl Record {
    /// Short kind name used in logging and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Run(_) => "run",
            Record::Config(_) => "config",
            Record::Summary(_) => "summary",
            Record::Metric(_) => "metric",
            Record::History(_) => "history",
            Record::PartialHistory(_) => "partial_history",
            Record::Files(_) => "files",
            Record::Output(_) => "output",
            Record::OutputRaw(_) => "output_raw",
            Record::Alert(_) => "alert",
            Record::Telemetry(_) => "telemetry",
            Record::Artifact(_) => "artifact",
            Record::LinkArtifact(_) => "link_artifact",
            Record::Exit(_) => "exit",
        }
    }
}

/// A record together with its position in the run's ordered sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// 1-based sequence number within the run
    pub num: u64,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub record: Record,
}

/// Run creation / metadata update record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub metadata: crate::domain::run::RunMetadata,
}

/// Config delta; a `null` value deletes the key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub update: BTreeMap<String, Value>,
}

/// Summary delta; a `null` value deletes the key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub update: BTreeMap<String, Value>,
}

/// Metric definition
///
/// `step_metric` names the axis history values for this metric are plotted
/// against. It must reference the built-in `_step` axis or a previously
/// defined metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub step_metric: Option<String>,
    /// Hide this metric from default dashboards
    #[serde(default)]
    pub hidden: bool,
}

/// A complete history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub step: i64,
    pub items: BTreeMap<String, Value>,
}

/// A streaming partial history row
///
/// Partial rows for the same step merge into one open row; a row closes when
/// `flush` is set or a different step number arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialHistoryRecord {
    pub step: i64,
    pub items: BTreeMap<String, Value>,
    #[serde(default)]
    pub flush: bool,
}

/// Files the client wants tracked with the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesRecord {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the run directory on the client side
    pub path: String,
    pub policy: FilePolicy,
}

/// When the named file should be synchronized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePolicy {
    Now,
    End,
    Live,
}

/// One captured console line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub stream: OutputStream,
    pub line: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// User-raised alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub title: String,
    pub text: String,
    pub level: AlertLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warn,
    Error,
}

/// Opaque client telemetry blob, passed through unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub data: Value,
}

/// Artifact manifest logged against the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub artifact_type: String,
    pub digest: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Link an existing artifact into a portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkArtifactRecord {
    pub artifact_name: String,
    pub portfolio: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Exit marker with the process exit code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRecord {
    pub exit_code: i32,
}
