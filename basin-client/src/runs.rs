//! Run lifecycle API endpoints

use crate::BasinClient;
use crate::error::Result;
use basin_core::domain::run::{RunInfo, RunMetadata};
use basin_core::dto::run::{
    AttachRequest, PollExitResponse, RunExitRequest, StartRunRequest, UpdateRunRequest,
};

impl BasinClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Start (register) a new run
    ///
    /// # Example
    /// ```no_run
    /// # use basin_client::BasinClient;
    /// # use basin_core::domain::run::RunMetadata;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = BasinClient::new("http://localhost:8723");
    /// let run = client.start_run("run1", RunMetadata {
    ///     project: Some("demo".to_string()),
    ///     ..Default::default()
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_run(&self, run_id: &str, metadata: RunMetadata) -> Result<RunInfo> {
        let url = format!("{}/server/inform/start", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&StartRunRequest {
                run_id: run_id.to_string(),
                metadata,
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Attach to an active or persisted run
    ///
    /// Idempotent and safe to call concurrently from multiple processes.
    pub async fn attach_run(&self, run_id: &str) -> Result<RunInfo> {
        let url = format!("{}/server/inform/attach", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AttachRequest {
                run_id: run_id.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Drop the server's in-memory session for a run, keeping its data
    pub async fn detach_run(&self, run_id: &str) -> Result<()> {
        let url = format!("{}/server/inform/detach", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AttachRequest {
                run_id: run_id.to_string(),
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// List all active runs
    pub async fn list_runs(&self) -> Result<Vec<RunInfo>> {
        let url = format!("{}/runs", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get info for one active run
    pub async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let url = format!("{}/run/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Apply a metadata patch to a run
    pub async fn update_run(&self, run_id: &str, metadata: RunMetadata) -> Result<RunInfo> {
        let url = format!("{}/run/{}/update", self.base_url, run_id);
        let response = self
            .client
            .post(&url)
            .json(&UpdateRunRequest { metadata })
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Exit / Poll
    // =============================================================================

    /// Begin run finalization; completion is observed via `poll_exit`
    pub async fn run_exit(&self, run_id: &str, exit_code: i32) -> Result<()> {
        let url = format!("{}/run/{}/exit", self.base_url, run_id);
        let response = self
            .client
            .post(&url)
            .json(&RunExitRequest { exit_code })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Non-blocking exit poll; `done` stays true once reported
    pub async fn poll_exit(&self, run_id: &str) -> Result<PollExitResponse> {
        let url = format!("{}/run/{}/exit", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Run Flags
    // =============================================================================

    /// Flag the run as about to be preempted by its scheduler
    pub async fn run_preempting(&self, run_id: &str) -> Result<()> {
        let url = format!("{}/run/{}/preempting", self.base_url, run_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Suspend heartbeat expectations for the run
    pub async fn pause_run(&self, run_id: &str) -> Result<()> {
        let url = format!("{}/run/{}/pause", self.base_url, run_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Resume heartbeat expectations for the run
    pub async fn resume_run(&self, run_id: &str) -> Result<()> {
        let url = format!("{}/run/{}/resume", self.base_url, run_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
