//! API Module
//!
//! HTTP API layer for the sync server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod record;
pub mod run;
pub mod server;
pub mod transfer;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{
    ExitCoordinator, LifecycleController, RecordSink, SessionRegistry, TransferManager,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleController>,
    pub registry: Arc<SessionRegistry>,
    pub sink: RecordSink,
    pub exit: ExitCoordinator,
    pub transfers: Arc<TransferManager>,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        registry: Arc<SessionRegistry>,
        transfers: Arc<TransferManager>,
    ) -> Self {
        Self {
            lifecycle,
            sink: RecordSink::new(Arc::clone(&registry)),
            exit: ExitCoordinator::new(Arc::clone(&registry)),
            registry,
            transfers,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Server lifecycle endpoints
        .route("/server/inform/init", post(server::inform_init))
        .route("/server/inform/start", post(server::inform_start))
        .route("/server/inform/attach", post(server::inform_attach))
        .route("/server/inform/detach", post(server::inform_detach))
        .route("/server/inform/finish", post(server::inform_finish))
        .route("/server/inform/teardown", post(server::inform_teardown))
        .route("/server/status", get(server::server_status))
        .route("/server/info", get(server::server_info))
        .route("/server/shutdown", post(server::server_shutdown))
        .route("/server/keepalive", post(server::keepalive))
        .route("/server/check_version", post(server::check_version))
        // Run lifecycle endpoints
        .route("/runs", get(run::list_runs))
        .route("/run/{id}", get(run::get_run))
        .route("/run/{id}/update", post(run::update_run))
        .route("/run/{id}/exit", post(run::run_exit))
        .route("/run/{id}/exit", get(run::poll_exit))
        .route("/run/{id}/preempting", post(run::run_preempting))
        .route("/run/{id}/pause", post(run::pause_run))
        .route("/run/{id}/resume", post(run::resume_run))
        // Record endpoints
        .route("/run/{id}/record/config", post(record::append_config))
        .route("/run/{id}/record/summary", post(record::append_summary))
        .route("/run/{id}/record/metric", post(record::define_metric))
        .route("/run/{id}/record/history", post(record::append_history))
        .route(
            "/run/{id}/record/history/partial",
            post(record::append_partial_history),
        )
        .route("/run/{id}/record/files", post(record::append_files))
        .route("/run/{id}/record/output", post(record::append_output))
        .route("/run/{id}/record/output/raw", post(record::append_output_raw))
        .route("/run/{id}/record/alert", post(record::append_alert))
        .route("/run/{id}/record/telemetry", post(record::append_telemetry))
        .route("/run/{id}/record/artifact", post(record::append_artifact))
        .route(
            "/run/{id}/record/artifact/link",
            post(record::link_artifact),
        )
        // Query endpoints
        .route("/run/{id}/summary", get(record::get_summary))
        .route("/run/{id}/history/sampled", get(record::sampled_history))
        // Artifact transfer endpoints
        .route("/artifact/send", post(transfer::artifact_send))
        .route("/artifact/{job_id}", get(transfer::artifact_poll))
        .route("/artifact/{job_id}/cancel", post(transfer::artifact_cancel))
        .route(
            "/artifact/{job_id}/release",
            post(transfer::artifact_release),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
