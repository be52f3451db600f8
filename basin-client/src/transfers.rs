//! Artifact transfer API endpoints

use crate::BasinClient;
use crate::error::Result;
use basin_core::domain::transfer::{TransferJob, TransferSpec};
use basin_core::dto::transfer::SendResponse;
use uuid::Uuid;

impl BasinClient {
    /// Enqueue an artifact transfer; returns the job id immediately
    pub async fn artifact_send(&self, spec: TransferSpec) -> Result<SendResponse> {
        let url = format!("{}/artifact/send", self.base_url);
        let response = self.client.post(&url).json(&spec).send().await?;

        self.handle_response(response).await
    }

    /// Non-blocking poll for one transfer job
    pub async fn artifact_poll(&self, job_id: Uuid) -> Result<TransferJob> {
        let url = format!("{}/artifact/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a pending or in-progress transfer; no-op once terminal
    pub async fn artifact_cancel(&self, job_id: Uuid) -> Result<()> {
        let url = format!("{}/artifact/{}/cancel", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Free server-side bookkeeping for a finished transfer
    pub async fn artifact_release(&self, job_id: Uuid) -> Result<()> {
        let url = format!("{}/artifact/{}/release", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
