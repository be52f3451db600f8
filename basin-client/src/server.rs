//! Server lifecycle API endpoints

use crate::BasinClient;
use crate::error::Result;
use basin_core::dto::run::AttachRequest;
use basin_core::dto::server::{
    CheckVersionRequest, CheckVersionResponse, ServerInfoResponse, ServerStatusResponse,
};

impl BasinClient {
    /// Mark the server ready for run-scoped calls
    ///
    /// Must be called once before any run or record operation; repeat calls
    /// are idempotent.
    pub async fn inform_init(&self) -> Result<()> {
        let url = format!("{}/server/inform/init", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Detach a run the client is done with
    pub async fn inform_finish(&self, run_id: &str) -> Result<()> {
        let url = format!("{}/server/inform/finish", self.base_url);
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

    /// Tear the server down; terminal, everything afterwards is rejected
    pub async fn inform_teardown(&self) -> Result<()> {
        let url = format!("{}/server/inform/teardown", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Idempotent status query, usable at any lifecycle point
    pub async fn server_status(&self) -> Result<ServerStatusResponse> {
        let url = format!("{}/server/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Server name and version
    pub async fn server_info(&self) -> Result<ServerInfoResponse> {
        let url = format!("{}/server/info", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Ask the serve loop to stop; idempotent
    pub async fn server_shutdown(&self) -> Result<()> {
        let url = format!("{}/server/shutdown", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Touch the server's last-seen timestamp
    pub async fn keepalive(&self) -> Result<()> {
        let url = format!("{}/server/keepalive", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Check client/server version compatibility
    pub async fn check_version(&self, client_version: &str) -> Result<CheckVersionResponse> {
        let url = format!("{}/server/check_version", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CheckVersionRequest {
                client_version: client_version.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
