//! Artifact Transfer API Handlers
//!
//! HTTP endpoints for the send/poll/cancel/release transfer lifecycle.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use basin_core::domain::transfer::{TransferJob, TransferSpec};
use basin_core::dto::transfer::SendResponse;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /artifact/send
/// Enqueue a transfer and return its job id
pub async fn artifact_send(
    State(state): State<AppState>,
    Json(spec): Json<TransferSpec>,
) -> ApiResult<Json<SendResponse>> {
    state.lifecycle.ensure_ready()?;

    let response = state.transfers.send(spec)?;
    Ok(Json(response))
}

/// GET /artifact/{job_id}
/// Non-blocking poll for one transfer job
pub async fn artifact_poll(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<TransferJob>> {
    state.lifecycle.ensure_ready()?;

    let job = state.transfers.poll(job_id)?;
    Ok(Json(job))
}

/// POST /artifact/{job_id}/cancel
/// Cancel a pending or in-progress transfer; no-op once terminal
pub async fn artifact_cancel(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;

    state.transfers.cancel(job_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /artifact/{job_id}/release
/// Free job bookkeeping; later calls for the id are NotFound
pub async fn artifact_release(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;

    state.transfers.release(job_id)?;
    Ok(StatusCode::NO_CONTENT)
}
