//! Ephemeral-credential minting for realtime sessions.
//!
//! The browser must never see the long-lived upstream API key. Instead it
//! asks lectern-server for a short-lived session credential, and the
//! server exchanges the long-lived key for one here: a single POST to the
//! upstream client-secrets endpoint, returning the opaque token string.
//!
//! One mint per connect attempt. Tokens are never persisted, never reused
//! across sessions, and never logged.

mod config;
mod error;

pub use config::MintConfig;
pub use error::MintError;

use serde::Deserialize;
use serde_json::json;

/// Successful upstream exchange body. Only the credential field matters;
/// everything else the upstream returns is ignored.
#[derive(Debug, Deserialize)]
struct ClientSecretResponse {
    value: Option<String>,
}

/// Exchanges the long-lived upstream credential for ephemeral session
/// credentials.
#[derive(Debug)]
pub struct TokenMinter {
    config: MintConfig,
    client: reqwest::Client,
}

impl TokenMinter {
    pub fn new(config: MintConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Whether a long-lived credential is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Mints one ephemeral session credential.
    ///
    /// Takes no caller-supplied parameters: the session shape (model,
    /// voice) comes entirely from configuration, so a caller cannot
    /// escalate the credential's scope.
    ///
    /// # Errors
    ///
    /// - [`MintError::MissingCredential`] when no long-lived key is
    ///   configured
    /// - [`MintError::Http`] on transport failure
    /// - [`MintError::Upstream`] on a non-2xx upstream status, carrying
    ///   the status and body
    /// - [`MintError::Protocol`] when a 2xx body lacks the credential
    ///   field
    pub async fn mint(&self) -> Result<String, MintError> {
        if !self.is_configured() {
            return Err(MintError::MissingCredential);
        }

        let body = json!({
            "session": {
                "type": "realtime",
                "model": self.config.model,
                "audio": {
                    "output": { "voice": self.config.voice }
                }
            }
        });

        let response = self
            .client
            .post(&self.config.upstream_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "upstream credential exchange failed");
            return Err(MintError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ClientSecretResponse = response
            .json()
            .await
            .map_err(|e| MintError::Protocol(format!("unparseable upstream body: {e}")))?;

        let token = parsed.value.ok_or_else(|| {
            MintError::Protocol("upstream response missing credential value".to_string())
        })?;

        tracing::debug!("minted ephemeral session credential");
        Ok(token)
    }
}
