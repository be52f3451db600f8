//! Record logging and query API endpoints

use std::collections::BTreeMap;

use crate::BasinClient;
use crate::error::Result;
use basin_core::domain::record::{
    AlertRecord, ArtifactRecord, ConfigRecord, FilesRecord, HistoryRow, LinkArtifactRecord,
    MetricRecord, OutputRecord, PartialHistoryRecord, SummaryRecord, TelemetryRecord,
};
use basin_core::dto::record::{AppendResponse, SampledHistoryResponse, SummaryResponse};
use serde_json::Value;

impl BasinClient {
    // =============================================================================
    // Record Appends
    // =============================================================================

    /// Merge a config delta into the run; a `null` value deletes the key
    pub async fn log_config(
        &self,
        run_id: &str,
        update: BTreeMap<String, Value>,
    ) -> Result<AppendResponse> {
        self.append(run_id, "config", &ConfigRecord { update }).await
    }

    /// Merge a summary delta into the run; a `null` value deletes the key
    pub async fn log_summary(
        &self,
        run_id: &str,
        update: BTreeMap<String, Value>,
    ) -> Result<AppendResponse> {
        self.append(run_id, "summary", &SummaryRecord { update })
            .await
    }

    /// Define a metric and its step axis
    pub async fn define_metric(&self, run_id: &str, metric: MetricRecord) -> Result<AppendResponse> {
        self.append(run_id, "metric", &metric).await
    }

    /// Log one complete history row
    pub async fn log_history(&self, run_id: &str, row: HistoryRow) -> Result<AppendResponse> {
        self.append(run_id, "history", &row).await
    }

    /// Stream part of a history row
    ///
    /// Values for the same step merge into one open row on the server; the
    /// row closes when `flush` is set or a different step number arrives.
    pub async fn log_partial_history(
        &self,
        run_id: &str,
        partial: PartialHistoryRecord,
    ) -> Result<AppendResponse> {
        self.append(run_id, "history/partial", &partial).await
    }

    /// Register files to be tracked with the run
    pub async fn log_files(&self, run_id: &str, files: FilesRecord) -> Result<AppendResponse> {
        self.append(run_id, "files", &files).await
    }

    /// Log one captured console line
    pub async fn log_output(&self, run_id: &str, output: OutputRecord) -> Result<AppendResponse> {
        self.append(run_id, "output", &output).await
    }

    /// Log one raw (uncaptured) console line
    pub async fn log_output_raw(
        &self,
        run_id: &str,
        output: OutputRecord,
    ) -> Result<AppendResponse> {
        self.append(run_id, "output/raw", &output).await
    }

    /// Raise an alert against the run
    pub async fn log_alert(&self, run_id: &str, alert: AlertRecord) -> Result<AppendResponse> {
        self.append(run_id, "alert", &alert).await
    }

    /// Pass through an opaque telemetry blob
    pub async fn log_telemetry(&self, run_id: &str, data: Value) -> Result<AppendResponse> {
        self.append(run_id, "telemetry", &TelemetryRecord { data })
            .await
    }

    /// Log an artifact manifest against the run
    pub async fn log_artifact(
        &self,
        run_id: &str,
        artifact: ArtifactRecord,
    ) -> Result<AppendResponse> {
        self.append(run_id, "artifact", &artifact).await
    }

    /// Link an existing artifact into a portfolio
    pub async fn link_artifact(
        &self,
        run_id: &str,
        link: LinkArtifactRecord,
    ) -> Result<AppendResponse> {
        self.append(run_id, "artifact/link", &link).await
    }

    async fn append<T: serde::Serialize>(
        &self,
        run_id: &str,
        kind: &str,
        payload: &T,
    ) -> Result<AppendResponse> {
        let url = format!("{}/run/{}/record/{}", self.base_url, run_id, kind);
        let response = self.client.post(&url).json(payload).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Queries
    // =============================================================================

    /// Current summary projection for the run
    pub async fn get_summary(&self, run_id: &str) -> Result<SummaryResponse> {
        let url = format!("{}/run/{}/summary", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Evenly spaced sample of one history series
    ///
    /// # Arguments
    /// * `key` - History key to sample
    /// * `samples` - Optional point budget; the server default applies when `None`
    pub async fn sampled_history(
        &self,
        run_id: &str,
        key: &str,
        samples: Option<usize>,
    ) -> Result<SampledHistoryResponse> {
        let url = format!("{}/run/{}/history/sampled", self.base_url, run_id);
        let mut request = self.client.get(&url).query(&[("key", key)]);
        if let Some(samples) = samples {
            request = request.query(&[("samples", samples.to_string())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
