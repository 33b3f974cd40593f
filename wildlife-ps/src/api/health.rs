//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::PredictorHealth;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the predictor is unavailable
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub predictor: PredictorHealth,
}

/// GET /health
///
/// Always 200: an unavailable predictor degrades the service, uploads will
/// fail with PREDICTOR_UNREACHABLE, but catalog endpoints keep working.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let predictor = state.orchestrator.predictor().health().await;
    let status = if predictor.available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "wildlife-ps".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        predictor,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
