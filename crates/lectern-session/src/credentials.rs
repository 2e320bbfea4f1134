//! Production credential source backed by the lectern-server mint endpoint.

use crate::error::SessionError;
use crate::link::CredentialSource;
use async_trait::async_trait;
use serde::Deserialize;

/// Response body of `POST /api/realtime/token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    value: String,
}

/// Error body returned by the mint endpoint on failure.
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Fetches ephemeral credentials from the lectern-server mint endpoint.
///
/// One round trip per connect attempt; nothing is cached. The long-lived
/// upstream credential never reaches this side of the trust boundary.
#[derive(Debug, Clone)]
pub struct MintEndpointCredentials {
    client: reqwest::Client,
    endpoint: String,
}

impl MintEndpointCredentials {
    /// Creates a credential source for the given mint endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for MintEndpointCredentials {
    async fn mint(&self) -> Result<String, SessionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| SessionError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenErrorResponse = response.json().await.unwrap_or_default();
            let message = body.error.unwrap_or_else(|| "token endpoint error".to_string());
            return Err(SessionError::Credential(format!("{status}: {message}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Credential(format!("malformed token response: {e}")))?;
        Ok(body.value)
    }
}
