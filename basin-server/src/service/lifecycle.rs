//! Server Lifecycle Controller
//!
//! Tracks process-wide readiness. InformInit gates every run-scoped call;
//! InformTeardown is terminal and flips the whole process into a state that
//! rejects everything except the idempotent status/shutdown queries.

use std::sync::Mutex;

use basin_core::dto::server::{CheckVersionResponse, ServerPhase, ServerStatusResponse};
use tokio::sync::watch;

use crate::service::error::ServiceError;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct LifecycleController {
    phase: Mutex<ServerPhase>,
    started_at: chrono::DateTime<chrono::Utc>,
    last_keepalive: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl LifecycleController {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            phase: Mutex::new(ServerPhase::Starting),
            started_at: chrono::Utc::now(),
            last_keepalive: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Marks the server ready for run-scoped calls; idempotent
    pub fn inform_init(&self) -> Result<(), ServiceError> {
        let mut phase = self.phase.lock().unwrap();
        match *phase {
            ServerPhase::Starting => {
                *phase = ServerPhase::Ready;
                tracing::info!("Server initialized");
                Ok(())
            }
            ServerPhase::Ready => Ok(()),
            ServerPhase::ShuttingDown => Err(ServiceError::ShuttingDown),
        }
    }

    /// Gate for run-scoped calls
    pub fn ensure_ready(&self) -> Result<(), ServiceError> {
        match *self.phase.lock().unwrap() {
            ServerPhase::Ready => Ok(()),
            ServerPhase::Starting => Err(ServiceError::InvalidArgument(
                "server not initialized; call /server/inform/init first".to_string(),
            )),
            ServerPhase::ShuttingDown => Err(ServiceError::ShuttingDown),
        }
    }

    /// Terminal transition; all later non-idempotent calls are rejected
    pub fn inform_teardown(&self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase != ServerPhase::ShuttingDown {
            tracing::info!("Server teardown requested");
            *phase = ServerPhase::ShuttingDown;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Asks the serve loop to stop without changing the lifecycle phase
    ///
    /// Usable at any point; repeat calls are no-ops.
    pub fn request_shutdown(&self) {
        tracing::info!("Server shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Receiver that resolves to `true` once shutdown was requested
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn phase(&self) -> ServerPhase {
        *self.phase.lock().unwrap()
    }

    pub fn keepalive(&self) -> chrono::DateTime<chrono::Utc> {
        let now = chrono::Utc::now();
        *self.last_keepalive.lock().unwrap() = Some(now);
        now
    }

    pub fn status(&self, active_runs: usize) -> ServerStatusResponse {
        let uptime = chrono::Utc::now() - self.started_at;
        ServerStatusResponse {
            phase: self.phase(),
            active_runs,
            uptime_seconds: uptime.num_seconds().max(0) as u64,
            last_keepalive: *self.last_keepalive.lock().unwrap(),
        }
    }

    /// Compatibility check: client and server must share a major version
    pub fn check_version(&self, client_version: &str) -> CheckVersionResponse {
        let compatible = match (major_of(client_version), major_of(SERVER_VERSION)) {
            (Some(client), Some(server)) => client == server,
            _ => false,
        };

        let message = if compatible {
            None
        } else {
            Some(format!(
                "client version {client_version} is not compatible with server {SERVER_VERSION}"
            ))
        };

        CheckVersionResponse {
            compatible,
            server_version: SERVER_VERSION.to_string(),
            message,
        }
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

fn major_of(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_gates_run_scoped_calls() {
        let lifecycle = LifecycleController::new();

        assert!(matches!(
            lifecycle.ensure_ready(),
            Err(ServiceError::InvalidArgument(_))
        ));

        lifecycle.inform_init().unwrap();
        assert!(lifecycle.ensure_ready().is_ok());

        // Second init is idempotent
        assert!(lifecycle.inform_init().is_ok());
    }

    #[test]
    fn test_teardown_is_terminal() {
        let lifecycle = LifecycleController::new();
        lifecycle.inform_init().unwrap();

        lifecycle.inform_teardown();
        assert_eq!(lifecycle.phase(), ServerPhase::ShuttingDown);
        assert!(matches!(
            lifecycle.ensure_ready(),
            Err(ServiceError::ShuttingDown)
        ));
        assert!(matches!(
            lifecycle.inform_init(),
            Err(ServiceError::ShuttingDown)
        ));

        // Teardown and status stay callable afterwards
        lifecycle.inform_teardown();
        assert_eq!(lifecycle.status(0).phase, ServerPhase::ShuttingDown);
    }

    #[test]
    fn test_shutdown_signal_observable() {
        let lifecycle = LifecycleController::new();
        let rx = lifecycle.subscribe_shutdown();
        assert!(!*rx.borrow());

        lifecycle.request_shutdown();
        assert!(*rx.borrow());
    }

    #[test]
    fn test_check_version() {
        let lifecycle = LifecycleController::new();

        let ok = lifecycle.check_version(SERVER_VERSION);
        assert!(ok.compatible);
        assert!(ok.message.is_none());

        let bad = lifecycle.check_version("99.0.0");
        assert!(!bad.compatible);
        assert!(bad.message.is_some());

        let garbage = lifecycle.check_version("not-a-version");
        assert!(!garbage.compatible);
    }
}
