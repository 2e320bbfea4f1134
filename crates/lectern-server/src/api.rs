//! API handlers for the Lectern server.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lectern_mint::MintError;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// Error bodies follow the `{ "error": <message>, "details"?: <string> }`
/// shape the front-end expects. Upstream diagnostic text goes into
/// `details`; `error` stays a short user-facing string.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("server is not configured: {0}")]
    Configuration(String),
    #[error("upstream error: {0}")]
    Upstream(String, Option<String>),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            ApiError::Upstream(msg, details) => (StatusCode::BAD_GATEWAY, msg, details),
        };

        let mut body = json!({ "error": message });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

impl From<MintError> for ApiError {
    fn from(e: MintError) -> Self {
        match e {
            MintError::MissingCredential => {
                Self::Configuration("realtime API key is not configured".to_string())
            }
            MintError::Upstream { status, body } => Self::Upstream(
                "could not create a session credential".to_string(),
                Some(format!("upstream returned {status}: {body}")),
            ),
            MintError::Protocol(msg) => Self::Upstream(
                "unexpected upstream response".to_string(),
                Some(msg),
            ),
            MintError::Http(e) => Self::Upstream(
                "could not reach the realtime service".to_string(),
                Some(e.to_string()),
            ),
        }
    }
}

/// Handler for `POST /api/realtime/token`.
///
/// Takes no request body: the session shape is fixed server-side. Returns
/// `{ "value": <ephemeral token> }`.
pub async fn mint_token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = state.minter.mint().await?;
    Ok(Json(json!({ "value": token })))
}
