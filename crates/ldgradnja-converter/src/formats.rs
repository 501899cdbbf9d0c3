//! Drawing formats handled by the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Drawing formats known to the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawingFormat {
    /// AutoCAD DWG (source)
    Dwg,
    /// AutoCAD DXF (interchange)
    Dxf,
    /// SVG vector image (presentation)
    Svg,
}

impl DrawingFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Dwg => "dwg",
            Self::Dxf => "dxf",
            Self::Svg => "svg",
        }
    }

    /// MIME type used in responses.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Dwg => "application/acad",
            Self::Dxf => "application/dxf",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Whether `filename` ends with this format's extension, ignoring case.
    pub fn matches_filename(&self, filename: &str) -> bool {
        filename
            .to_lowercase()
            .ends_with(&format!(".{}", self.extension()))
    }

    /// Replace the extension of `filename` with this format's extension.
    ///
    /// Directory components sent by some browsers are dropped.
    pub fn swap_extension(&self, filename: &str) -> String {
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("drawing");
        format!("{}.{}", stem, self.extension())
    }
}

impl std::fmt::Display for DrawingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}
