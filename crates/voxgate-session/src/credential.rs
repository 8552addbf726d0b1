//! Client for the credential issuance service.

use crate::error::CredentialError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use voxgate_types::{Credential, RoomGrant};

/// Issues room credentials. Implementations must not cache: every call
/// yields a freshly issued credential.
pub trait CredentialSource: Send + Sync + 'static {
    fn fetch_credential(
        &self,
        room: &str,
        identity: &str,
    ) -> impl Future<Output = Result<Credential, CredentialError>> + Send;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    url: Option<String>,
}

/// [`CredentialSource`] backed by `GET <url>?room=<room>&name=<identity>`.
#[derive(Debug, Clone)]
pub struct HttpCredentialClient {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Unreachable(format!("http client setup failed: {}", e)))?;
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

impl CredentialSource for HttpCredentialClient {
    async fn fetch_credential(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<Credential, CredentialError> {
        if room.is_empty() {
            return Err(CredentialError::InvalidInput("room must be non-empty"));
        }
        if identity.is_empty() {
            return Err(CredentialError::InvalidInput("identity must be non-empty"));
        }

        let res = self
            .client
            .get(&self.url)
            .query(&[("room", room), ("name", identity)])
            .send()
            .await
            .map_err(|e| CredentialError::Unreachable(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| CredentialError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(CredentialError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(CredentialError::Malformed("empty token".to_string()));
        }

        let credential = Credential::new(
            parsed.token,
            parsed.url.unwrap_or_default(),
            RoomGrant::new(room, identity),
        );
        tracing::info!(
            room,
            identity,
            fetch_id = %credential.fetch_id(),
            token_len = credential.access_token().len(),
            "credential issued"
        );
        Ok(credential)
    }
}
