use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod service;
pub mod store;

use crate::api::AppState;
use crate::config::Config;
use crate::service::{LifecycleController, SessionRegistry, TransferConfig, TransferManager};
use crate::store::RunStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "basin_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Basin sync server...");

    let config = Config::from_env();
    config.validate().expect("Invalid configuration");

    tracing::info!("Data directory: {}", config.data_dir.display());

    let store = RunStore::open(config.data_dir.clone()).expect("Failed to open run store");

    let lifecycle = Arc::new(LifecycleController::new());
    let registry = Arc::new(SessionRegistry::new(store));
    let transfers = Arc::new(TransferManager::new(
        config.data_dir.join("artifacts"),
        TransferConfig {
            max_attempts: config.transfer_max_attempts,
            initial_backoff: config.transfer_initial_backoff,
            max_backoff: config.transfer_max_backoff,
            chunk_size: config.transfer_chunk_size,
        },
    ));

    let mut shutdown_rx = lifecycle.subscribe_shutdown();

    // Build router with all API endpoints
    let state = AppState::new(lifecycle, registry, transfers);
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|requested| *requested).await;
            tracing::info!("Shutting down");
        })
        .await
        .expect("Failed to start server");
}
