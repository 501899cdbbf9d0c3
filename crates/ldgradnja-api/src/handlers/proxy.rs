//! Reverse proxy to the AI API.
//!
//! The upstream credential is resolved per request: the server-side key
//! from the environment when present, otherwise whatever `Authorization`
//! the caller sent. Without either, nothing is sent upstream.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use ldgradnja_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// ANY /api/openai/{*path}
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let authorization = resolve_credential(&state, &headers)?;
    let url = upstream_url(&state.config.proxy.upstream_base_url, &path, query.as_deref());

    debug!(%method, %url, "Forwarding to AI API");

    let mut request = state
        .http_client
        .request(method, &url)
        .header(AUTHORIZATION, authorization);
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        request = request.header(CONTENT_TYPE, content_type.clone());
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await.map_err(transport_error)?;
    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await.map_err(transport_error)?;

    debug!(status = status.as_u16(), size = bytes.len(), "AI API responded");

    let mut response = (status, Body::from(bytes)).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

fn resolve_credential(state: &AppState, headers: &HeaderMap) -> Result<HeaderValue, ApiError> {
    if let Some(key) = state.config.proxy.server_api_key() {
        return HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            ApiError(AppError::configuration(format!(
                "Vrijednost varijable {} nije ispravna",
                state.config.proxy.api_key_env
            )))
        });
    }

    match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => {
            warn!(
                env = %state.config.proxy.api_key_env,
                "Server API key not set, forwarding caller credential"
            );
            Ok(value.clone())
        }
        _ => Err(ApiError(AppError::unauthorized(
            "API kljuc nije postavljen",
        ))),
    }
}

/// `<base>/<path>[?query]`, with exactly one slash at the join.
pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        warn!(error = %err, "AI API timed out");
        ApiError(AppError::gateway_timeout(
            "AI servis nije odgovorio na vrijeme",
        ))
    } else {
        warn!(error = %err, "AI API unreachable");
        ApiError(AppError::bad_gateway(format!(
            "Nije moguce kontaktirati AI servis: {err}"
        )))
    }
}
