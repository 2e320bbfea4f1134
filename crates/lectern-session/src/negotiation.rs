//! Connection-description exchange with the remote realtime service.
//!
//! The offer is posted directly to the remote session-creation endpoint
//! with the ephemeral credential as a bearer token. It deliberately does
//! NOT go through the mint endpoint: negotiation can take well over ten
//! seconds, and proxying it used to push the mint request past its
//! timeout.

use crate::error::SessionError;
use std::time::Duration;

/// Deadline for the full offer/answer round trip. Negotiation against the
/// remote service is routinely slow (>10 s); anything past this is treated
/// as failed.
const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Posts the local offer and returns the remote answer.
///
/// # Errors
///
/// [`SessionError::Negotiation`] on transport failure, timeout, or a
/// non-2xx upstream status (wrapping the upstream diagnostic body when
/// available).
pub async fn exchange_offer(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    token: &str,
    offer_sdp: &str,
) -> Result<String, SessionError> {
    let url = format!("{base_url}?model={model}");

    tracing::debug!(url = %base_url, model, "posting connection offer");

    let request = client
        .post(&url)
        .bearer_auth(token)
        .header(reqwest::header::CONTENT_TYPE, "application/sdp")
        .body(offer_sdp.to_string());

    let response = tokio::time::timeout(NEGOTIATION_TIMEOUT, request.send())
        .await
        .map_err(|_| {
            SessionError::Negotiation(format!(
                "timed out after {} seconds",
                NEGOTIATION_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| SessionError::Negotiation(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SessionError::Negotiation(e.to_string()))?;

    if !status.is_success() {
        return Err(SessionError::Negotiation(format!(
            "remote service returned {status}: {body}"
        )));
    }

    Ok(body)
}
