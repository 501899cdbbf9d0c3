//! Prebuilt single-page frontend.
//!
//! Files under the static directory are served as-is; any other path gets
//! the index document with status 200 so client-side routes work on reload.

use std::path::Path;

use axum::http::Uri;
use tower_http::services::{ServeDir, ServeFile};

use ldgradnja_core::error::AppError;

use crate::error::ApiError;

/// Service for the frontend bundle rooted at `static_dir`.
pub fn static_files(static_dir: &Path, index: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(index))
}

/// Fallback when no bundle is deployed.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError(AppError::not_found(format!(
        "Ruta {} nije pronadjena",
        uri.path()
    )))
}
