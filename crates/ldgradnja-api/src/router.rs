//! Route definitions for the LDGradnja HTTP API.
//!
//! Conversion and proxy routes carry their own body limits; everything not
//! matched by an API route goes to the frontend bundle (or a JSON 404 when
//! there is none).

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{any, get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::frontend;
use crate::handlers;
use crate::middleware;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.converter.max_upload_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let router = Router::new()
        .merge(health_routes())
        .merge(convert_routes(body_limit))
        .merge(proxy_routes(body_limit));

    let router = match &state.static_dir {
        Some(dir) => {
            let index = state.config.frontend.index_path(dir);
            router.fallback_service(frontend::static_files(dir, &index))
        }
        None => router.fallback(frontend::not_found),
    };

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.server.cors))
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Liveness and diagnostics
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

/// DWG uploads
fn convert_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/convert/dwg-to-dxf", post(handlers::convert::dwg_to_dxf))
        .route("/convert/dwg-to-svg", post(handlers::convert::dwg_to_svg))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// AI API pass-through
fn proxy_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/api/openai/{*path}", any(handlers::proxy::forward))
        .layer(DefaultBodyLimit::max(body_limit))
}
