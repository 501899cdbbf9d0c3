//! Configuration for the drawing conversion subsystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which capability performs the DWG → DXF step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterStrategy {
    /// Run an external converter binary (LibreDWG `dwg2dxf`).
    #[default]
    ExternalTool,
    /// Read the source in-process with the drawing library.
    NativeLibrary,
}

impl std::fmt::Display for ConverterStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalTool => write!(f, "external_tool"),
            Self::NativeLibrary => write!(f, "native_library"),
        }
    }
}

/// Configuration for drawing conversions.
///
/// `args` is a template: `{input}`, `{output}`, `{input_dir}` and
/// `{output_dir}` are substituted per invocation. The default `["{input}"]`
/// lets `dwg2dxf` pick its own output name next to the input.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Converter selection.
    #[serde(default)]
    pub strategy: ConverterStrategy,

    /// External converter executable.
    #[serde(default = "default_command")]
    #[validate(length(min = 1))]
    pub command: String,

    /// External converter argument template.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Time bound for a single conversion hop.
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_seconds: u64,

    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    #[validate(range(min = 1))]
    pub max_upload_bytes: u64,

    /// Root for per-request working directories. Defaults to the system
    /// temp dir.
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Conversions allowed to run at the same time; further requests wait.
    #[serde(default = "default_max_concurrent_conversions")]
    #[validate(range(min = 1, max = 64))]
    pub max_concurrent_conversions: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            strategy: ConverterStrategy::default(),
            command: default_command(),
            args: default_args(),
            timeout_seconds: default_timeout_seconds(),
            max_upload_bytes: default_max_upload_bytes(),
            temp_root: None,
            max_concurrent_conversions: default_max_concurrent_conversions(),
        }
    }
}

impl ConverterConfig {
    /// Resolve the effective temp root directory.
    pub fn effective_temp_root(&self) -> PathBuf {
        self.temp_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ldgradnja"))
    }

    /// Upload limit rendered in whole mebibytes, for user-facing messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

fn default_command() -> String {
    "dwg2dxf".to_string()
}

fn default_args() -> Vec<String> {
    vec!["{input}".to_string()]
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_concurrent_conversions() -> usize {
    4
}
