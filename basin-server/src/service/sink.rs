//! Record Sink
//!
//! Accepts ordered record appends per run and answers the summary and
//! sampled-history queries. Validation happens before anything touches the
//! log, so a rejected append has no observable side effect. The session
//! mutex serializes appends for one run; appends for distinct runs proceed
//! in parallel.

use std::sync::Arc;

use basin_core::domain::record::Record;
use basin_core::dto::record::{
    AppendResponse, SampledHistoryResponse, SamplePoint, SummaryResponse,
};

use crate::service::error::ServiceError;
use crate::service::registry::SessionRegistry;

/// Default point budget for sampled history queries
pub const DEFAULT_HISTORY_SAMPLES: usize = 500;

#[derive(Clone)]
pub struct RecordSink {
    registry: Arc<SessionRegistry>,
}

impl RecordSink {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Appends one record to a run
    ///
    /// The record is durable on disk before the call returns.
    pub async fn append(&self, run_id: &str, record: Record) -> Result<AppendResponse, ServiceError> {
        let session = self.registry.get(run_id).await?;
        let mut state = session.state.lock().await;

        state.validate(&record)?;
        tracing::debug!("Appending {} record to run {}", record.kind(), run_id);
        let num = state.persist_and_apply(record)?;

        Ok(AppendResponse {
            accepted: true,
            num,
        })
    }

    /// Current summary projection for a run
    ///
    /// Reflects summary deltas and the last logged history value per key.
    pub async fn get_summary(&self, run_id: &str) -> Result<SummaryResponse, ServiceError> {
        let session = self.registry.get(run_id).await?;
        let state = session.state.lock().await;
        Ok(SummaryResponse {
            run_id: run_id.to_string(),
            summary: state.summary.clone(),
        })
    }

    /// Evenly spaced sample of the history values logged for `key`
    ///
    /// Rows without the key are skipped. When more rows carry the key than
    /// the sample budget allows, an evenly spaced subset that always
    /// includes the first and last row is returned.
    pub async fn sampled_history(
        &self,
        run_id: &str,
        key: &str,
        samples: Option<usize>,
    ) -> Result<SampledHistoryResponse, ServiceError> {
        let budget = samples.unwrap_or(DEFAULT_HISTORY_SAMPLES);
        if budget == 0 {
            return Err(ServiceError::InvalidArgument(
                "sample budget must be greater than 0".to_string(),
            ));
        }

        let session = self.registry.get(run_id).await?;
        let state = session.state.lock().await;

        let matching: Vec<SamplePoint> = state
            .history
            .iter()
            .filter_map(|row| {
                row.items.get(key).map(|value| SamplePoint {
                    step: row.step,
                    value: value.clone(),
                })
            })
            .collect();

        Ok(SampledHistoryResponse {
            run_id: run_id.to_string(),
            key: key.to_string(),
            points: sample_evenly(matching, budget),
        })
    }
}

/// Picks `budget` evenly spaced points, keeping the first and last
fn sample_evenly(points: Vec<SamplePoint>, budget: usize) -> Vec<SamplePoint> {
    if points.len() <= budget {
        return points;
    }
    if budget == 1 {
        return vec![points.into_iter().next_back().unwrap()];
    }

    let last = points.len() - 1;
    let mut sampled = Vec::with_capacity(budget);
    let mut previous = usize::MAX;
    for i in 0..budget {
        let idx = i * last / (budget - 1);
        if idx != previous {
            sampled.push(points[idx].clone());
            previous = idx;
        }
    }
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::domain::record::{
        AlertLevel, AlertRecord, ConfigRecord, HistoryRow, MetricRecord, PartialHistoryRecord,
        SummaryRecord,
    };
    use basin_core::domain::run::RunMetadata;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    use crate::store::RunStore;

    async fn sink_with_run(dir: &tempfile::TempDir, run_id: &str) -> (Arc<SessionRegistry>, RecordSink) {
        let registry = Arc::new(SessionRegistry::new(RunStore::open(dir.path()).unwrap()));
        registry.start(run_id, RunMetadata::default()).await.unwrap();
        let sink = RecordSink::new(Arc::clone(&registry));
        (registry, sink)
    }

    fn items(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn history(step: i64, pairs: &[(&str, Value)]) -> Record {
        Record::History(HistoryRow {
            step,
            items: items(pairs),
        })
    }

    fn partial(step: i64, pairs: &[(&str, Value)], flush: bool) -> Record {
        Record::PartialHistory(PartialHistoryRecord {
            step,
            items: items(pairs),
            flush,
        })
    }

    #[tokio::test]
    async fn test_append_unknown_run() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        let result = sink
            .append("ghost", Record::Config(ConfigRecord::default()))
            .await;
        assert!(matches!(result, Err(ServiceError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_appends_are_sequenced() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        // The run record itself holds num 1
        let first = sink
            .append("run1", Record::Config(ConfigRecord::default()))
            .await
            .unwrap();
        let second = sink
            .append("run1", Record::Config(ConfigRecord::default()))
            .await
            .unwrap();
        assert!(first.accepted);
        assert_eq!(first.num, 2);
        assert_eq!(second.num, 3);
    }

    #[tokio::test]
    async fn test_config_merge_deletes_on_null() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, sink) = sink_with_run(&dir, "run1").await;

        sink.append(
            "run1",
            Record::Config(ConfigRecord {
                update: items(&[("lr", json!(0.1)), ("batch", json!(32))]),
            }),
        )
        .await
        .unwrap();
        sink.append(
            "run1",
            Record::Config(ConfigRecord {
                update: items(&[("lr", json!(0.01)), ("batch", Value::Null)]),
            }),
        )
        .await
        .unwrap();

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert_eq!(state.info.config.get("lr"), Some(&json!(0.01)));
        assert!(!state.info.config.contains_key("batch"));
    }

    #[tokio::test]
    async fn test_metric_with_undefined_step_axis_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, sink) = sink_with_run(&dir, "run1").await;

        let result = sink
            .append(
                "run1",
                Record::Metric(MetricRecord {
                    name: "loss".to_string(),
                    step_metric: Some("epoch".to_string()),
                    hidden: false,
                }),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

        // Rejected append leaves no trace
        let session = registry.get("run1").await.unwrap();
        assert_eq!(session.state.lock().await.info.record_count, 1);

        // Defining the axis first makes the same record valid
        sink.append(
            "run1",
            Record::Metric(MetricRecord {
                name: "epoch".to_string(),
                step_metric: Some("_step".to_string()),
                hidden: false,
            }),
        )
        .await
        .unwrap();
        sink.append(
            "run1",
            Record::Metric(MetricRecord {
                name: "loss".to_string(),
                step_metric: Some("epoch".to_string()),
                hidden: false,
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_alert_requires_title() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        let result = sink
            .append(
                "run1",
                Record::Alert(AlertRecord {
                    title: String::new(),
                    text: "cpu on fire".to_string(),
                    level: AlertLevel::Error,
                }),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_partial_history_merges_by_step() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, sink) = sink_with_run(&dir, "run1").await;

        sink.append("run1", partial(0, &[("loss", json!(1.0))], false))
            .await
            .unwrap();
        sink.append("run1", partial(0, &[("acc", json!(0.5))], false))
            .await
            .unwrap();

        {
            let session = registry.get("run1").await.unwrap();
            let state = session.state.lock().await;
            assert!(state.history.is_empty());
            let open = state.open_row.as_ref().unwrap();
            assert_eq!(open.step, 0);
            assert_eq!(open.items.len(), 2);
        }

        // A later step closes the merged row unchanged
        sink.append("run1", partial(1, &[("loss", json!(0.8))], false))
            .await
            .unwrap();

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].step, 0);
        assert_eq!(state.history[0].items.get("loss"), Some(&json!(1.0)));
        assert_eq!(state.history[0].items.get("acc"), Some(&json!(0.5)));
        assert_eq!(state.open_row.as_ref().unwrap().step, 1);
    }

    #[tokio::test]
    async fn test_partial_history_explicit_flush() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, sink) = sink_with_run(&dir, "run1").await;

        sink.append("run1", partial(5, &[("loss", json!(0.3))], true))
            .await
            .unwrap();

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert!(state.open_row.is_none());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].step, 5);
    }

    #[tokio::test]
    async fn test_full_history_flushes_open_row() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, sink) = sink_with_run(&dir, "run1").await;

        sink.append("run1", partial(0, &[("loss", json!(1.0))], false))
            .await
            .unwrap();
        sink.append("run1", history(1, &[("loss", json!(0.9))]))
            .await
            .unwrap();

        let session = registry.get("run1").await.unwrap();
        let state = session.state.lock().await;
        assert!(state.open_row.is_none());
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].step, 0);
        assert_eq!(state.history[1].step, 1);
    }

    #[tokio::test]
    async fn test_summary_reflects_last_logged_values() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        sink.append(
            "run1",
            Record::Summary(SummaryRecord {
                update: items(&[("note", json!("hand-set"))]),
            }),
        )
        .await
        .unwrap();
        sink.append("run1", history(0, &[("loss", json!(1.0))]))
            .await
            .unwrap();
        sink.append("run1", history(1, &[("loss", json!(0.7))]))
            .await
            .unwrap();

        let summary = sink.get_summary("run1").await.unwrap();
        assert_eq!(summary.summary.get("loss"), Some(&json!(0.7)));
        assert_eq!(summary.summary.get("note"), Some(&json!("hand-set")));
    }

    #[tokio::test]
    async fn test_sampled_history_returns_all_when_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        for step in 0..10 {
            sink.append("run1", history(step, &[("loss", json!(step))]))
                .await
                .unwrap();
        }

        let response = sink
            .sampled_history("run1", "loss", Some(100))
            .await
            .unwrap();
        assert_eq!(response.points.len(), 10);
    }

    #[tokio::test]
    async fn test_sampled_history_downsamples_evenly() {
        let dir = tempfile::tempdir().unwrap();
        let (_registry, sink) = sink_with_run(&dir, "run1").await;

        for step in 0..100 {
            sink.append("run1", history(step, &[("loss", json!(step))]))
                .await
                .unwrap();
        }

        let response = sink
            .sampled_history("run1", "loss", Some(5))
            .await
            .unwrap();
        assert_eq!(response.points.len(), 5);
        assert_eq!(response.points.first().unwrap().step, 0);
        assert_eq!(response.points.last().unwrap().step, 99);

        // Unknown key yields an empty series, not an error
        let empty = sink
            .sampled_history("run1", "missing", None)
            .await
            .unwrap();
        assert!(empty.points.is_empty());

        // A zero budget is rejected
        assert!(matches!(
            sink.sampled_history("run1", "loss", Some(0)).await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }
}
