//! Server Lifecycle API Handlers
//!
//! HTTP endpoints for process-wide lifecycle: inform-init through
//! inform-teardown, plus the idempotent status/shutdown/version queries.

use axum::{Json, extract::State, http::StatusCode};
use basin_core::domain::run::RunInfo;
use basin_core::dto::run::{AttachRequest, StartRunRequest};
use basin_core::dto::server::{
    CheckVersionRequest, CheckVersionResponse, ServerInfoResponse, ServerStatusResponse,
};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::lifecycle::SERVER_VERSION;

/// POST /server/inform/init
/// Mark the server ready for run-scoped calls
pub async fn inform_init(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.lifecycle.inform_init()?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /server/inform/start
/// Register a new run
pub async fn inform_start(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> ApiResult<Json<RunInfo>> {
    state.lifecycle.ensure_ready()?;
    tracing::info!("Starting run: {}", req.run_id);

    let info = state.registry.start(&req.run_id, req.metadata).await?;
    Ok(Json(info))
}

/// POST /server/inform/attach
/// Attach to an active or persisted run
pub async fn inform_attach(
    State(state): State<AppState>,
    Json(req): Json<AttachRequest>,
) -> ApiResult<Json<RunInfo>> {
    state.lifecycle.ensure_ready()?;
    tracing::debug!("Attaching to run: {}", req.run_id);

    let info = state.registry.attach(&req.run_id).await?;
    Ok(Json(info))
}

/// POST /server/inform/detach
/// Drop the in-memory session, preserving the run's data
pub async fn inform_detach(
    State(state): State<AppState>,
    Json(req): Json<AttachRequest>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;
    state.registry.detach(&req.run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /server/inform/finish
/// Client is done with the run; detach it
pub async fn inform_finish(
    State(state): State<AppState>,
    Json(req): Json<AttachRequest>,
) -> ApiResult<StatusCode> {
    state.lifecycle.ensure_ready()?;
    tracing::info!("Finishing run: {}", req.run_id);
    state.registry.detach(&req.run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /server/inform/teardown
/// Terminal: detach everything and stop serving
pub async fn inform_teardown(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.lifecycle.inform_teardown();
    state.registry.shutdown().await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /server/status
/// Idempotent status query, usable at any lifecycle point
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatusResponse> {
    let active = state.registry.active_count().await;
    Json(state.lifecycle.status(active))
}

/// GET /server/info
pub async fn server_info() -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: SERVER_VERSION.to_string(),
    })
}

/// POST /server/shutdown
/// Idempotent: asks the serve loop to stop
pub async fn server_shutdown(State(state): State<AppState>) -> StatusCode {
    state.lifecycle.request_shutdown();
    StatusCode::NO_CONTENT
}

/// POST /server/keepalive
pub async fn keepalive(State(state): State<AppState>) -> Json<serde_json::Value> {
    let at = state.lifecycle.keepalive();
    Json(serde_json::json!({ "alive_at": at }))
}

/// POST /server/check_version
pub async fn check_version(
    State(state): State<AppState>,
    Json(req): Json<CheckVersionRequest>,
) -> Json<CheckVersionResponse> {
    Json(state.lifecycle.check_version(&req.client_version))
}
