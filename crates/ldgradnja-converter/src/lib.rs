//! # ldgradnja-converter
//!
//! Drawing conversion for LDGradnja: DWG → DXF through an external tool
//! (LibreDWG's `dwg2dxf`) or the `dxf` crate, and DXF → SVG rendering of
//! model space.
//!
//! A request is converted inside its own working directory, which is
//! removed on every exit path. When the SVG stage fails after a DXF was
//! produced, the DXF is returned as a tagged fallback instead of an error.

pub mod converter;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod formats;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod render;

pub use converter::{DrawingConverter, ExternalToolConverter, HopResult, NativeLibraryConverter};
pub use error::ConversionError;
pub use formats::DrawingFormat;
pub use metrics::MetricsSnapshot;
pub use models::{Artifact, ConversionOutcome, ConversionRequest, FailureClass};
pub use processor::ConversionProcessor;
pub use render::{RenderError, SvgRenderer};
