use serde::{Deserialize, Serialize};
use std::fmt;

fn default_upstream_url() -> String {
    "https://api.openai.com/v1/realtime/client_secrets".to_string()
}

fn default_model() -> String {
    "gpt-realtime".to_string()
}

fn default_voice() -> String {
    "marin".to_string()
}

/// Configuration for the token minter.
///
/// `api_key` is the long-lived upstream credential. It is read from the
/// process environment by lectern-server, never serialized back out, and
/// redacted from `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Upstream client-secrets endpoint.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Realtime model the minted credential is scoped to.
    #[serde(default = "default_model")]
    pub model: String,

    /// Output voice the minted credential is scoped to.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Long-lived upstream API key. Never serialized, and never read
    /// from a config file — it arrives only through the environment.
    #[serde(skip)]
    pub api_key: String,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            model: default_model(),
            voice: default_voice(),
            api_key: String::new(),
        }
    }
}

impl fmt::Debug for MintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintConfig")
            .field("upstream_url", &self.upstream_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
