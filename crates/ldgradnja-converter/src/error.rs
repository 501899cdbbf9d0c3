//! Unified error type for the drawing conversion crate.
//!
//! Converter and renderer failures are not errors here: they are part of
//! the [`ConversionOutcome`](crate::models::ConversionOutcome) returned to
//! the caller. `ConversionError` covers rejected requests and broken
//! infrastructure (working directory I/O, task joins, cancellation).

use ldgradnja_core::error::AppError;
use thiserror::Error;

use crate::formats::DrawingFormat;

/// Unified error type for all drawing conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The uploaded filename does not carry the accepted extension.
    #[error("Fajl mora biti .{} format", expected.extension())]
    InvalidExtension {
        /// The accepted input format.
        expected: DrawingFormat,
    },

    /// The uploaded payload is larger than the configured limit.
    #[error("Fajl je prevelik (max {}MB)", limit_bytes / (1024 * 1024))]
    PayloadTooLarge {
        /// Maximum accepted size in bytes.
        limit_bytes: u64,
    },

    /// The request was abandoned before the conversion finished.
    #[error("Konverzija je otkazana")]
    Cancelled,

    /// The admission semaphore was closed.
    #[error("Conversion limiter closed")]
    SemaphoreClosed,

    /// Working directory I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match &err {
            ConversionError::InvalidExtension { .. } => AppError::validation(err.to_string()),
            ConversionError::PayloadTooLarge { .. } => {
                AppError::payload_too_large(err.to_string())
            }
            _ => AppError::internal(err.to_string()),
        }
    }
}
