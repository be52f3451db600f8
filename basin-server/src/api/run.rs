//! Run Lifecycle API Handlers
//!
//! HTTP endpoints for per-run lifecycle: inspection, metadata updates,
//! exit/poll, preemption and pause flags.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use basin_core::domain::run::RunInfo;
use basin_core::dto::run::{PollExitResponse, RunExitRequest, UpdateRunRequest};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /runs
/// List all active runs
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<Vec<RunInfo>>> {
    state.lifecycle.ensure_ready()?;
    Ok(Json(state.registry.list().await))
}

/// GET /run/{id}
/// Get info for one active run
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunInfo>> {
    state.lifecycle.ensure_ready()?;

    let session = state.registry.get(&id).await?;
    let info = session.state.lock().await.info.clone();
    Ok(Json(info))
}

/// POST /run/{id}/update
/// Apply a metadata patch to a run
pub async fn update_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRunRequest>,
) -> ApiResult<Json<RunInfo>> {
    state.lifecycle.ensure_ready()?;
    tracing::debug!("Updating run: {}", id);

    let info = state.registry.update_run(&id, req.metadata).await?;
    Ok(Json(info))
}

/// POST /run/{id}/exit
/// Begin run finalization; poll GET /run/{id}/exit for completion
pub async fn run_exit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RunExitRequest>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;

    state.exit.run_exit(&id, req.exit_code).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /run/{id}/exit
/// Non-blocking exit poll; done stays true once reported
pub async fn poll_exit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PollExitResponse>> {
    state.lifecycle.ensure_ready()?;

    let response = state.exit.poll_exit(&id).await?;
    Ok(Json(response))
}

/// POST /run/{id}/preempting
/// Flag the run as about to be preempted
pub async fn run_preempting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;
    tracing::info!("Run {} preempting", id);

    state.registry.set_preempting(&id, true).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /run/{id}/pause
pub async fn pause_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;

    state.registry.set_paused(&id, true).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /run/{id}/resume
pub async fn resume_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;

    state.registry.set_paused(&id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}
