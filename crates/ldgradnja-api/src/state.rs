//! Application state shared across all handlers and middleware.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use ldgradnja_converter::ConversionProcessor;
use ldgradnja_core::config::AppConfig;
use ldgradnja_core::error::AppError;
use ldgradnja_core::result::AppResult;

/// Shared application state. Cloned into every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Conversion pipeline.
    pub processor: Arc<ConversionProcessor>,
    /// Client for the AI API proxy.
    pub http_client: reqwest::Client,
    /// Frontend bundle directory, resolved once at startup.
    pub static_dir: Option<PathBuf>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration: processor, proxy client and the
    /// static directory lookup.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let processor = ConversionProcessor::new(&config.converter)?;
        Self::with_processor(config, processor)
    }

    /// Build state around an existing processor.
    pub fn with_processor(
        config: AppConfig,
        processor: ConversionProcessor,
    ) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.proxy.timeout_seconds))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        let static_dir = config.frontend.resolve_static_dir();
        match &static_dir {
            Some(dir) => tracing::info!(dir = %dir.display(), "Serving frontend bundle"),
            None => tracing::info!(
                dir = %config.frontend.static_dir.display(),
                "Frontend bundle not found, static routes disabled"
            ),
        }

        Ok(Self {
            config: Arc::new(config),
            processor: Arc::new(processor),
            http_client,
            static_dir,
            started_at: Instant::now(),
        })
    }
}
