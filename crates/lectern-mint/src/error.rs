use thiserror::Error;

/// Errors from the credential exchange.
#[derive(Debug, Error)]
pub enum MintError {
    /// No long-lived upstream key is configured. Fatal to the request,
    /// not retried.
    #[error("no upstream API key configured")]
    MissingCredential,

    /// The upstream exchange returned a non-2xx status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The exchange succeeded but the response omitted the expected
    /// credential field or could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
}
