//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Cache status: "ok" or "unavailable".
    pub cache: String,
}

/// Health check endpoint.
///
/// The service stays up when the cache is down; reads and fan-out degrade instead.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache = match state.cache.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Cache ping failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        service: "photofeed".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: cache.to_string(),
    })
}
