//! Conversion processor: admission, working directory lifecycle, the
//! DWG → DXF → SVG pipeline with its fallback policy, and metrics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ldgradnja_core::config::{ConverterConfig, ConverterStrategy};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::converter::{DrawingConverter, HopResult, build_converter};
use crate::error::ConversionError;
use crate::filesystem::WorkingDirectory;
use crate::formats::DrawingFormat;
use crate::metrics::{ConversionMetrics, MetricsSnapshot};
use crate::models::{
    Artifact, ConversionOutcome, ConversionRequest, FIRST_HOP_FAILED, FailureClass,
};
use crate::render::{RenderError, SvgRenderer};

/// Name the upload is stored under inside its working directory.
const INPUT_FILENAME: &str = "input.dwg";

/// Runs conversions. Cheap to clone; clones share the limiter and metrics.
#[derive(Debug, Clone)]
pub struct ConversionProcessor {
    converter: Arc<dyn DrawingConverter>,
    renderer: SvgRenderer,
    temp_root: PathBuf,
    timeout_seconds: u64,
    limiter: Arc<Semaphore>,
    metrics: Arc<ConversionMetrics>,
}

impl ConversionProcessor {
    /// Create a processor using the converter selected by `config`.
    pub fn new(config: &ConverterConfig) -> Result<Self, ConversionError> {
        Self::with_converter(config, build_converter(config))
    }

    /// Create a processor around an explicit converter.
    pub fn with_converter(
        config: &ConverterConfig,
        converter: Arc<dyn DrawingConverter>,
    ) -> Result<Self, ConversionError> {
        let temp_root = config.effective_temp_root();
        std::fs::create_dir_all(&temp_root)?;

        Ok(Self {
            converter,
            renderer: SvgRenderer::new(),
            temp_root,
            timeout_seconds: config.timeout_seconds,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_conversions)),
            metrics: Arc::new(ConversionMetrics::new()),
        })
    }

    /// Active converter strategy.
    pub fn strategy(&self) -> ConverterStrategy {
        self.converter.strategy()
    }

    /// Directory holding the per-request working directories.
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Single hop: DWG → DXF.
    #[instrument(skip_all, fields(job_id, filename = %request.source_filename()))]
    pub async fn dwg_to_dxf(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        self.run(request, DrawingFormat::Dxf, cancel).await
    }

    /// Two hops: DWG → DXF → SVG, falling back to the DXF when rendering
    /// fails.
    #[instrument(skip_all, fields(job_id, filename = %request.source_filename()))]
    pub async fn dwg_to_svg(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        self.run(request, DrawingFormat::Svg, cancel).await
    }

    async fn run(
        &self,
        request: &ConversionRequest,
        target: DrawingFormat,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.metrics.record_cancelled();
                return Err(ConversionError::Cancelled);
            }
            permit = self.limiter.acquire() => {
                permit.map_err(|_| ConversionError::SemaphoreClosed)?
            }
        };

        self.metrics
            .record_started(request.source_bytes().len() as u64);
        let in_flight = InFlight::new(&self.metrics);
        let start = Instant::now();

        let result = match WorkingDirectory::create(&self.temp_root).await {
            Ok(workdir) => {
                if let Some(name) = workdir.path().file_name() {
                    tracing::Span::current().record("job_id", name.to_string_lossy().as_ref());
                }
                let result = self.run_in(&workdir, request, target, cancel).await;
                workdir.release().await;
                result
            }
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed();
        self.record(&result, elapsed);
        in_flight.settle();

        match &result {
            Ok(outcome) => info!(
                target_format = %target,
                outcome = outcome.label(),
                duration_ms = elapsed.as_millis() as u64,
                "Conversion finished"
            ),
            Err(e) => warn!(
                target_format = %target,
                error = %e,
                duration_ms = elapsed.as_millis() as u64,
                "Conversion aborted"
            ),
        }

        result
    }

    async fn run_in(
        &self,
        workdir: &WorkingDirectory,
        request: &ConversionRequest,
        target: DrawingFormat,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        let input = workdir
            .write_file(INPUT_FILENAME, request.source_bytes())
            .await?;

        let dxf_path = match self.converter.convert(&input, workdir, cancel).await? {
            HopResult::Produced(path) => path,
            HopResult::TimedOut => return Ok(ConversionOutcome::timed_out(self.timeout_seconds)),
            HopResult::NotProduced { diagnostic } if target == DrawingFormat::Svg => {
                let diagnostic = match diagnostic {
                    Some(detail) => format!("{FIRST_HOP_FAILED}: {detail}"),
                    None => FIRST_HOP_FAILED.to_string(),
                };
                return Ok(ConversionOutcome::Failure {
                    class: FailureClass::ConversionFailed,
                    diagnostic,
                });
            }
            HopResult::NotProduced { diagnostic } => {
                return Ok(ConversionOutcome::conversion_failed(diagnostic));
            }
        };

        let dxf_bytes = tokio::fs::read(&dxf_path).await?;
        let dxf_artifact = Artifact::new(
            DrawingFormat::Dxf,
            dxf_bytes,
            request.output_filename(DrawingFormat::Dxf),
        );

        if target == DrawingFormat::Dxf {
            return Ok(ConversionOutcome::Success(dxf_artifact));
        }

        match self.render(&dxf_path, cancel).await {
            Ok(svg) => Ok(ConversionOutcome::Success(Artifact::new(
                DrawingFormat::Svg,
                svg,
                request.output_filename(DrawingFormat::Svg),
            ))),
            Err(RenderError::Cancelled) => Err(ConversionError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Rendering failed, returning DXF");
                Ok(ConversionOutcome::Fallback {
                    artifact: dxf_artifact,
                    diagnostic: e.to_string(),
                })
            }
        }
    }

    /// Render on the blocking pool under the same time bound as a hop.
    async fn render(&self, dxf: &Path, cancel: &CancellationToken) -> Result<Vec<u8>, RenderError> {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let renderer = self.renderer;
        let path = dxf.to_path_buf();
        let task = tokio::task::spawn_blocking(move || renderer.render_file(&path));

        match tokio::time::timeout(Duration::from_secs(self.timeout_seconds), task).await {
            Ok(joined) => joined?,
            Err(_) => Err(RenderError::Timeout(self.timeout_seconds)),
        }
    }

    fn record(&self, result: &Result<ConversionOutcome, ConversionError>, elapsed: Duration) {
        match result {
            Ok(ConversionOutcome::Success(artifact)) => self
                .metrics
                .record_success(elapsed, artifact.bytes.len() as u64),
            Ok(ConversionOutcome::Fallback { artifact, .. }) => self
                .metrics
                .record_fallback(elapsed, artifact.bytes.len() as u64),
            Ok(ConversionOutcome::Failure {
                class: FailureClass::TimedOut,
                ..
            }) => self.metrics.record_timeout(),
            Ok(ConversionOutcome::Failure { .. }) => self.metrics.record_failure(),
            Err(ConversionError::Cancelled) => self.metrics.record_cancelled(),
            Err(_) => self.metrics.record_failure(),
        }
    }
}

/// Counts a started conversion as cancelled when its future is dropped
/// before an outcome was recorded.
struct InFlight<'a> {
    metrics: &'a ConversionMetrics,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(metrics: &'a ConversionMetrics) -> Self {
        Self {
            metrics,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.metrics.record_cancelled();
        }
    }
}
