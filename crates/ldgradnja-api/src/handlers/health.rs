//! Health check handlers.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use ldgradnja_converter::MetricsSnapshot;
use ldgradnja_core::config::ConverterStrategy;

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Body of `GET /health/detailed`.
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub converter_strategy: ConverterStrategy,
    pub frontend_bundle: bool,
    pub conversions: MetricsSnapshot,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /health/detailed
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    Json(DetailedHealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        converter_strategy: state.processor.strategy(),
        frontend_bundle: state.static_dir.is_some(),
        conversions: state.processor.metrics(),
    })
}
