//! Record Sink API Handlers
//!
//! One append endpoint per record kind, plus the summary and
//! sampled-history queries. Every append is durable before the response
//! is sent.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use basin_core::domain::record::{
    AlertRecord, ArtifactRecord, ConfigRecord, FilesRecord, HistoryRow, LinkArtifactRecord,
    MetricRecord, OutputRecord, PartialHistoryRecord, Record, SummaryRecord, TelemetryRecord,
};
use basin_core::dto::record::{AppendResponse, SampledHistoryResponse, SummaryResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;

async fn append(state: &AppState, run_id: &str, record: Record) -> ApiResult<Json<AppendResponse>> {
    state.lifecycle.ensure_ready()?;
    let response = state.sink.append(run_id, record).await?;
    Ok(Json(response))
}

/// POST /run/{id}/record/config
pub async fn append_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<ConfigRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Config(record)).await
}

/// POST /run/{id}/record/summary
pub async fn append_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<SummaryRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Summary(record)).await
}

/// POST /run/{id}/record/metric
pub async fn define_metric(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<MetricRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Metric(record)).await
}

/// POST /run/{id}/record/history
pub async fn append_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<HistoryRow>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::History(record)).await
}

/// POST /run/{id}/record/history/partial
pub async fn append_partial_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<PartialHistoryRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::PartialHistory(record)).await
}

/// POST /run/{id}/record/files
pub async fn append_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<FilesRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Files(record)).await
}

/// POST /run/{id}/record/output
pub async fn append_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<OutputRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Output(record)).await
}

/// POST /run/{id}/record/output/raw
pub async fn append_output_raw(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<OutputRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::OutputRaw(record)).await
}

/// POST /run/{id}/record/alert
pub async fn append_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<AlertRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Alert(record)).await
}

/// POST /run/{id}/record/telemetry
pub async fn append_telemetry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<TelemetryRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Telemetry(record)).await
}

/// POST /run/{id}/record/artifact
pub async fn append_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<ArtifactRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::Artifact(record)).await
}

/// POST /run/{id}/record/artifact/link
pub async fn link_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<LinkArtifactRecord>,
) -> ApiResult<Json<AppendResponse>> {
    append(&state, &id, Record::LinkArtifact(record)).await
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /run/{id}/summary
/// Current summary projection for the run
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SummaryResponse>> {
    state.lifecycle.ensure_ready()?;

    let response = state.sink.get_summary(&id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SampledHistoryQuery {
    pub key: String,
    pub samples: Option<usize>,
}

/// GET /run/{id}/history/sampled?key=loss&samples=100
/// Evenly spaced sample of one history series
pub async fn sampled_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SampledHistoryQuery>,
) -> ApiResult<Json<SampledHistoryResponse>> {
    state.lifecycle.ensure_ready()?;

    let response = state
        .sink
        .sampled_history(&id, &params.key, params.samples)
        .await?;
    Ok(Json(response))
}
