//! `DwgUpload` extractor: reads the multipart `file` field into a validated
//! [`ConversionRequest`].
//!
//! The filename is checked before any content is read, and the size limit
//! is enforced while streaming, so rejected uploads never reach disk.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use tracing::debug;

use ldgradnja_converter::{ConversionError, ConversionRequest, DrawingFormat};
use ldgradnja_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the drawing.
pub const FILE_FIELD: &str = "file";

/// A `.dwg` upload within the configured size limit.
#[derive(Debug)]
pub struct DwgUpload(pub ConversionRequest);

fn missing_file() -> ApiError {
    ConversionError::InvalidExtension {
        expected: DrawingFormat::Dwg,
    }
    .into()
}

fn multipart_error(err: MultipartError, limit_bytes: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConversionError::PayloadTooLarge { limit_bytes }.into()
    } else {
        ApiError(AppError::validation(format!(
            "Neispravan multipart zahtjev: {}",
            err.body_text()
        )))
    }
}

impl FromRequest<AppState> for DwgUpload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let limit = state.config.converter.max_upload_bytes;

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|_| missing_file())?;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let filename = ConversionRequest::check_filename(field.file_name())?.to_string();

            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, limit))?
            {
                if (bytes.len() + chunk.len()) as u64 > limit {
                    return Err(ConversionError::PayloadTooLarge { limit_bytes: limit }.into());
                }
                bytes.extend_from_slice(&chunk);
            }

            let request = ConversionRequest::new(filename, bytes, limit)?;
            debug!(
                filename = %request.source_filename(),
                extension = %request.declared_extension(),
                size = request.source_bytes().len(),
                "Upload received"
            );
            return Ok(Self(request));
        }

        Err(missing_file())
    }
}
