//! Drawing conversion handlers.
//!
//! Each request gets a cancellation token whose drop guard lives in the
//! handler future: if the client disconnects, axum drops the future, the
//! token fires and the converter process is killed.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::sync::CancellationToken;

use ldgradnja_converter::{Artifact, ConversionOutcome, DrawingFormat, FailureClass};
use ldgradnja_core::error::AppError;

use crate::error::ApiError;
use crate::extractors::DwgUpload;
use crate::state::AppState;

/// Set on fallback responses.
pub const X_FALLBACK: HeaderName = HeaderName::from_static("x-fallback");
/// Render diagnostic on fallback responses.
pub const X_ERROR: HeaderName = HeaderName::from_static("x-error");

/// Longest `X-Error` value sent.
const MAX_ERROR_HEADER_CHARS: usize = 1024;

/// POST /convert/dwg-to-dxf
pub async fn dwg_to_dxf(
    State(state): State<AppState>,
    DwgUpload(request): DwgUpload,
) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.processor.dwg_to_dxf(&request, &cancel).await?;
    Ok(outcome_response(outcome))
}

/// POST /convert/dwg-to-svg
pub async fn dwg_to_svg(
    State(state): State<AppState>,
    DwgUpload(request): DwgUpload,
) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.processor.dwg_to_svg(&request, &cancel).await?;
    Ok(outcome_response(outcome))
}

/// Map a pipeline outcome onto the HTTP contract.
pub fn outcome_response(outcome: ConversionOutcome) -> Response {
    match outcome {
        ConversionOutcome::Success(artifact) => artifact_response(artifact),
        ConversionOutcome::Fallback {
            artifact,
            diagnostic,
        } => {
            let mut response = artifact_response(artifact);
            let headers = response.headers_mut();
            headers.insert(X_FALLBACK, HeaderValue::from_static("true"));
            if let Ok(value) = HeaderValue::from_str(&header_safe(&diagnostic)) {
                headers.insert(X_ERROR, value);
            }
            response
        }
        ConversionOutcome::Failure {
            class: FailureClass::TimedOut,
            diagnostic,
        } => ApiError(AppError::timeout(diagnostic)).into_response(),
        ConversionOutcome::Failure { diagnostic, .. } => {
            ApiError(AppError::conversion(diagnostic)).into_response()
        }
    }
}

fn artifact_response(artifact: Artifact) -> Response {
    let disposition = if artifact.media_type == DrawingFormat::Svg.mime_type() {
        DispositionType::Inline
    } else {
        DispositionType::Attachment
    };
    let disposition = HeaderValue::from_str(&content_disposition(disposition, &artifact.filename))
        .unwrap_or_else(|_| HeaderValue::from_static(disposition.as_str()));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(artifact.media_type)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from(artifact.bytes),
    )
        .into_response()
}

/// `attr-char` from RFC 5987: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// How the browser should treat a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionType {
    /// Shown in place (SVG previews).
    Inline,
    /// Saved as a file.
    Attachment,
}

impl DispositionType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// `<type>; filename="..."`, with an RFC 5987 `filename*` when the name is
/// not plain ASCII.
pub fn content_disposition(disposition: DispositionType, filename: &str) -> String {
    let kind = disposition.as_str();
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if ascii == filename {
        format!("{kind}; filename=\"{ascii}\"")
    } else {
        format!(
            "{kind}; filename=\"{ascii}\"; filename*=UTF-8''{}",
            utf8_percent_encode(filename, ATTR_CHAR)
        )
    }
}

/// Reduce free text to a valid header value: visible ASCII only, line
/// breaks folded to spaces, bounded length.
pub fn header_safe(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .take(MAX_ERROR_HEADER_CHARS)
        .collect()
}
