//! DWG → DXF converter strategies.
//!
//! The pipeline only sees [`DrawingConverter`]. Which implementation runs is
//! decided once, from `converter.strategy`, by [`build_converter`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldgradnja_core::config::{ConverterConfig, ConverterStrategy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::executor::{ConversionExecutor, ExecutionParams};
use crate::filesystem::{ArtifactLocator, WorkingDirectory};
use crate::formats::DrawingFormat;

/// Result of one DWG → DXF hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopResult {
    /// A DXF file exists at the given path.
    Produced(PathBuf),
    /// No output was found. Carries the converter's own explanation, if any.
    NotProduced { diagnostic: Option<String> },
    /// The hop exceeded its time bound.
    TimedOut,
}

/// Turns a DWG file into a DXF file inside a working directory.
#[async_trait]
pub trait DrawingConverter: Send + Sync + std::fmt::Debug {
    /// Strategy implemented by this converter.
    fn strategy(&self) -> ConverterStrategy;

    /// Convert `input` (a file inside `workdir`).
    ///
    /// Converter failures are reported through [`HopResult`]; only
    /// cancellation and working-directory I/O are errors.
    async fn convert(
        &self,
        input: &Path,
        workdir: &WorkingDirectory,
        cancel: &CancellationToken,
    ) -> Result<HopResult, ConversionError>;
}

/// Build the converter selected by configuration.
pub fn build_converter(config: &ConverterConfig) -> Arc<dyn DrawingConverter> {
    match config.strategy {
        ConverterStrategy::ExternalTool => Arc::new(ExternalToolConverter::new(
            config.command.clone(),
            config.args.clone(),
            config.timeout_seconds,
        )),
        ConverterStrategy::NativeLibrary => {
            Arc::new(NativeLibraryConverter::new(config.timeout_seconds))
        }
    }
}

/// Runs an external binary (LibreDWG's `dwg2dxf` by default) and then looks
/// for whatever DXF it wrote.
#[derive(Debug, Clone)]
pub struct ExternalToolConverter {
    executor: ConversionExecutor,
    command: String,
    args: Vec<String>,
    timeout_seconds: u64,
}

impl ExternalToolConverter {
    pub fn new(command: String, args: Vec<String>, timeout_seconds: u64) -> Self {
        Self {
            executor: ConversionExecutor::new(),
            command,
            args,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl DrawingConverter for ExternalToolConverter {
    fn strategy(&self) -> ConverterStrategy {
        ConverterStrategy::ExternalTool
    }

    async fn convert(
        &self,
        input: &Path,
        workdir: &WorkingDirectory,
        cancel: &CancellationToken,
    ) -> Result<HopResult, ConversionError> {
        let expected = input.with_extension(DrawingFormat::Dxf.extension());
        let params = ExecutionParams {
            command: self.command.clone(),
            args: self.executor.substitute_args(&self.args, input, &expected),
            working_dir: workdir.path().to_path_buf(),
            timeout_seconds: self.timeout_seconds,
        };

        let process = match self.executor.execute(&params, cancel).await {
            Ok(process) => process,
            Err(ConversionError::Io(e)) => {
                return Ok(HopResult::NotProduced {
                    diagnostic: Some(format!("failed to start '{}': {}", self.command, e)),
                });
            }
            Err(e) => return Err(e),
        };

        if process.timed_out {
            return Ok(HopResult::TimedOut);
        }

        match ArtifactLocator::locate(&expected, workdir.path()).await? {
            Some(path) => {
                if !process.succeeded() {
                    warn!(
                        exit_code = ?process.exit_code,
                        artifact = %path.display(),
                        "Converter reported failure but produced output"
                    );
                }
                Ok(HopResult::Produced(path))
            }
            None => Ok(HopResult::NotProduced {
                diagnostic: process.diagnostic(),
            }),
        }
    }
}

/// Reads the upload with the `dxf` crate and writes it back as normalized
/// ASCII DXF. No external process; only inputs the library understands
/// (DXF content, ASCII or binary) convert.
#[derive(Debug, Clone)]
pub struct NativeLibraryConverter {
    timeout_seconds: u64,
}

impl NativeLibraryConverter {
    pub fn new(timeout_seconds: u64) -> Self {
        Self { timeout_seconds }
    }
}

#[async_trait]
impl DrawingConverter for NativeLibraryConverter {
    fn strategy(&self) -> ConverterStrategy {
        ConverterStrategy::NativeLibrary
    }

    async fn convert(
        &self,
        input: &Path,
        _workdir: &WorkingDirectory,
        cancel: &CancellationToken,
    ) -> Result<HopResult, ConversionError> {
        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let source = input.to_path_buf();
        let output = input.with_extension(DrawingFormat::Dxf.extension());
        let target = output.clone();

        let task = tokio::task::spawn_blocking(move || -> dxf::DxfResult<()> {
            let drawing = dxf::Drawing::load_file(&source)?;
            drawing.save_file(&target)
        });

        let timeout = Duration::from_secs(self.timeout_seconds);
        let joined = tokio::select! {
            _ = cancel.cancelled() => return Err(ConversionError::Cancelled),
            joined = tokio::time::timeout(timeout, task) => joined,
        };

        match joined {
            Err(_) => Ok(HopResult::TimedOut),
            Ok(join) => match join? {
                Ok(()) => {
                    debug!(artifact = %output.display(), "Drawing re-written as DXF");
                    Ok(HopResult::Produced(output))
                }
                Err(e) => Ok(HopResult::NotProduced {
                    diagnostic: Some(e.to_string()),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_DXF: &str = "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\n0\n10\n0.0\n20\n0.0\n30\n0.0\n11\n1.0\n21\n1.0\n31\n0.0\n0\nENDSEC\n0\nEOF\n";

    fn external(script: &str) -> ExternalToolConverter {
        ExternalToolConverter::new(
            "sh".to_string(),
            vec!["-c".to_string(), script.to_string(), "sh".to_string(), "{input}".to_string()],
            5,
        )
    }

    #[test]
    fn test_build_converter_follows_strategy() {
        let mut config = ConverterConfig::default();
        assert_eq!(
            build_converter(&config).strategy(),
            ConverterStrategy::ExternalTool
        );
        config.strategy = ConverterStrategy::NativeLibrary;
        assert_eq!(
            build_converter(&config).strategy(),
            ConverterStrategy::NativeLibrary
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_expected_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"AC1032").await.expect("write");

        let converter = external("cp \"$1\" \"${1%.dwg}.dxf\"");
        let result = converter
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        assert_eq!(result, HopResult::Produced(workdir.join("input.dxf")));
        workdir.release().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_alternate_name_despite_exit_code() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"AC1032").await.expect("write");

        let converter = external("cp \"$1\" \"$(dirname \"$1\")/Input_R2000.DXF\"; exit 1");
        let result = converter
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        assert_eq!(result, HopResult::Produced(workdir.join("Input_R2000.DXF")));
        workdir.release().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_reports_stderr() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"garbage").await.expect("write");

        let converter = external("echo 'ERROR 0x40: unsupported version' >&2; exit 1");
        let result = converter
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        assert_eq!(
            result,
            HopResult::NotProduced {
                diagnostic: Some("ERROR 0x40: unsupported version".to_string())
            }
        );
        workdir.release().await;
    }

    #[tokio::test]
    async fn test_external_tool_missing_binary_is_not_produced() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"AC1032").await.expect("write");

        let converter = ExternalToolConverter::new(
            "ldgradnja-missing-dwg2dxf".to_string(),
            vec!["{input}".to_string()],
            5,
        );
        let result = converter
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        match result {
            HopResult::NotProduced {
                diagnostic: Some(text),
            } => assert!(text.contains("ldgradnja-missing-dwg2dxf")),
            other => panic!("unexpected result: {other:?}"),
        }
        workdir.release().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_timeout() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"AC1032").await.expect("write");

        let converter = ExternalToolConverter::new(
            "sleep".to_string(),
            vec!["5".to_string()],
            1,
        );
        let result = converter
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        assert_eq!(result, HopResult::TimedOut);
        workdir.release().await;
    }

    #[tokio::test]
    async fn test_native_library_rewrites_dxf_content() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir
            .write_file("input.dwg", MINIMAL_DXF.as_bytes())
            .await
            .expect("write");

        let result = NativeLibraryConverter::new(5)
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        let output = workdir.join("input.dxf");
        assert_eq!(result, HopResult::Produced(output.clone()));
        let written = std::fs::read_to_string(output).expect("read");
        assert!(written.contains("LINE"));
        workdir.release().await;
    }

    #[tokio::test]
    async fn test_native_library_rejects_unreadable_input() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir
            .write_file("input.dwg", b"not a drawing\nreally not\n")
            .await
            .expect("write");

        let result = NativeLibraryConverter::new(5)
            .convert(&input, &workdir, &CancellationToken::new())
            .await
            .expect("convert");

        assert!(matches!(
            result,
            HopResult::NotProduced {
                diagnostic: Some(_)
            }
        ));
        workdir.release().await;
    }

    #[tokio::test]
    async fn test_native_library_cancelled() {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::create(root.path()).await.expect("workdir");
        let input = workdir.write_file("input.dwg", b"AC1032").await.expect("write");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = NativeLibraryConverter::new(5)
            .convert(&input, &workdir, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, ConversionError::Cancelled));
        workdir.release().await;
    }
}
