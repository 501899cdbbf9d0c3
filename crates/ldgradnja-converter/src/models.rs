//! Domain models: the validated request, produced artifacts and the
//! pipeline outcome.

use serde::Serialize;

use crate::error::ConversionError;
use crate::formats::DrawingFormat;

/// Generic diagnostic used when the converter produced no output text.
pub const UNKNOWN_FAILURE: &str = "Nepoznata greska pri konverziji";

/// Prefix of every conversion failure diagnostic.
pub const FAILURE_PREFIX: &str = "Konverzija nije uspjela";

/// Message for a DWG → SVG request whose first hop failed.
pub const FIRST_HOP_FAILED: &str = "DWG konverzija u DXF nije uspjela";

/// A validated upload. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    source_bytes: Vec<u8>,
    source_filename: String,
    declared_extension: String,
}

impl ConversionRequest {
    /// Check an upload filename without touching its content.
    ///
    /// Returns the filename when it ends in `.dwg` (any case).
    pub fn check_filename(filename: Option<&str>) -> Result<&str, ConversionError> {
        match filename {
            Some(name) if DrawingFormat::Dwg.matches_filename(name) => Ok(name),
            _ => Err(ConversionError::InvalidExtension {
                expected: DrawingFormat::Dwg,
            }),
        }
    }

    /// Build a request, enforcing the extension and the size limit.
    pub fn new(
        filename: impl Into<String>,
        source_bytes: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, ConversionError> {
        let source_filename = filename.into();
        Self::check_filename(Some(&source_filename))?;

        if source_bytes.len() as u64 > max_bytes {
            return Err(ConversionError::PayloadTooLarge {
                limit_bytes: max_bytes,
            });
        }

        let declared_extension = source_filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            source_bytes,
            source_filename,
            declared_extension,
        })
    }

    /// Uploaded bytes.
    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    /// Uploaded filename as sent by the client.
    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// Extension as the client wrote it (`dwg`, `DWG`, ...).
    pub fn declared_extension(&self) -> &str {
        &self.declared_extension
    }

    /// Download name for an artifact of `format`.
    pub fn output_filename(&self, format: DrawingFormat) -> String {
        format.swap_extension(&self.source_filename)
    }
}

/// A produced file, ready to be sent to the client.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub filename: String,
}

impl Artifact {
    /// Wrap `bytes` as a `format` artifact named `filename`.
    pub fn new(format: DrawingFormat, bytes: Vec<u8>, filename: String) -> Self {
        Self {
            bytes,
            media_type: format.mime_type(),
            filename,
        }
    }
}

/// Why no artifact could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Non-zero exit without output, missing output, parse failure.
    ConversionFailed,
    /// A stage exceeded its time bound.
    TimedOut,
}

/// Result of one pipeline run. Produced exactly once per request.
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    /// The requested format was produced.
    Success(Artifact),
    /// Rendering failed; the intermediate DXF is returned instead.
    Fallback {
        artifact: Artifact,
        diagnostic: String,
    },
    /// Nothing usable was produced.
    Failure {
        class: FailureClass,
        diagnostic: String,
    },
}

impl ConversionOutcome {
    /// Failure with the `Konverzija nije uspjela: ...` diagnostic.
    pub fn conversion_failed(detail: Option<String>) -> Self {
        let detail = detail.unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
        Self::Failure {
            class: FailureClass::ConversionFailed,
            diagnostic: format!("{FAILURE_PREFIX}: {detail}"),
        }
    }

    /// Failure for an exceeded time bound.
    pub fn timed_out(timeout_seconds: u64) -> Self {
        Self::Failure {
            class: FailureClass::TimedOut,
            diagnostic: format!(
                "Konverzija je prekinuta: isteklo je vrijeme ({timeout_seconds}s)"
            ),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Fallback { .. } => "fallback",
            Self::Failure {
                class: FailureClass::TimedOut,
                ..
            } => "timed_out",
            Self::Failure { .. } => "failed",
        }
    }
}
