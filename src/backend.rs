//! Execution backend client.
//!
//! The [`ExecutionBackend`] trait is the only mutating call this service
//! makes. It asks the backend to cancel a run; the backend then advances
//! the job status on its own (`CANCELLING` → `CANCELLED`).
//!
//! ## Design principles
//!
//! - **Async-native**: the call is async and bounded by a deadline.
//! - **Thread-safe**: `Send + Sync` so one handle serves every request.
//! - **Single shot**: no retry and no idempotent re-check. Callers observe
//!   the result by reading the job again.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::job::RunId;

/// Default bound on a cancel call.
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend that runs query jobs.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Request cancellation of a run. `Ok(())` is an acknowledgement only.
    async fn cancel(&self, run_id: &RunId) -> Result<(), ExecutionError>;
}

/// [`ExecutionBackend`] speaking the serverless job-run REST API:
/// `DELETE <endpoint>/applications/<application_id>/jobruns/<run_id>`.
///
/// Request signing is left to the network path (signing proxy or sidecar).
#[derive(Debug, Clone)]
pub struct HttpExecutionBackend {
    client: reqwest::Client,
    endpoint: String,
    application_id: String,
    timeout: Duration,
}

impl HttpExecutionBackend {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        application_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            application_id: application_id.into(),
            timeout,
        }
    }

    fn job_run_url(&self, run_id: &RunId) -> String {
        format!(
            "{}/applications/{}/jobruns/{}",
            self.endpoint, self.application_id, run_id
        )
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    fn name(&self) -> &str {
        "emr-serverless"
    }

    async fn cancel(&self, run_id: &RunId) -> Result<(), ExecutionError> {
        let response = self
            .client
            .delete(self.job_run_url(run_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::Timeout(self.timeout)
                } else {
                    ExecutionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ExecutionError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
