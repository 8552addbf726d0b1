//! Client for the agent control service.

use crate::error::ProvisionError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use voxgate_types::Secrets;

/// Backend acknowledgement that the agent is (or already was) running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Started {
    /// Agent process is alive.
    #[serde(default)]
    pub running: bool,
    /// This call started it; `false` means it was already up.
    #[serde(default)]
    pub started: bool,
}

/// Starts the remote agent.
pub trait AgentProvisioner: Send + Sync + 'static {
    /// Sends `secrets` once. Failures are returned, never retried.
    fn start(&self, secrets: &Secrets) -> impl Future<Output = Result<Started, ProvisionError>> + Send;
}

/// [`AgentProvisioner`] that `POST`s the secrets as JSON to a URL.
#[derive(Debug, Clone)]
pub struct HttpProvisioner {
    client: reqwest::Client,
    url: String,
}

impl HttpProvisioner {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Unreachable(format!("http client setup failed: {}", e)))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AgentProvisioner for HttpProvisioner {
    async fn start(&self, secrets: &Secrets) -> Result<Started, ProvisionError> {
        tracing::info!(url = %self.url, providers = ?secrets, "requesting agent start");

        let res = self
            .client
            .post(&self.url)
            .json(secrets)
            .send()
            .await
            .map_err(|e| ProvisionError::Unreachable(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ProvisionError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "agent start rejected");
            return Err(ProvisionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // The backend's acknowledgement shape is advisory; a 2xx is success.
        let started = serde_json::from_str::<Started>(&body).unwrap_or_default();
        tracing::info!(
            running = started.running,
            started = started.started,
            "agent start acknowledged"
        );
        Ok(started)
    }
}
