//! Lectern server library logic.

pub mod api;
pub mod config;

use axum::{routing::get, routing::post, Extension, Json, Router};
use lectern_mint::TokenMinter;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Ephemeral-credential minter.
    pub minter: TokenMinter,
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load
/// balancers, monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
///
/// CORS is permissive: the browser front-end is served from a different
/// origin, and the only state-changing endpoint mints a credential that
/// is useless without the caller's own microphone.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/realtime/token", post(api::mint_token_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
