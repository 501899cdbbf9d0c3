//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files plus `LDGRADNJA__*` environment variables. Every field
//! carries a default, so the server starts without any file on disk.

pub mod app;
pub mod converter;
pub mod frontend;
pub mod logging;
pub mod proxy;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::app::{CorsConfig, ServerConfig};
pub use self::converter::{ConverterConfig, ConverterStrategy};
pub use self::frontend::FrontendConfig;
pub use self::logging::LoggingConfig;
pub use self::proxy::ProxyConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Drawing conversion settings.
    #[serde(default)]
    pub converter: ConverterConfig,
    /// AI API reverse proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Bundled frontend settings.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `{dir}/default.toml`, `{dir}/{env}.toml` and
    /// environment variables prefixed with `LDGRADNJA__`.
    ///
    /// Both files are optional. The result is validated before it is returned.
    pub fn load(dir: &str, env: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LDGRADNJA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app_config.converter.validate()?;
        app_config.proxy.validate()?;

        Ok(app_config)
    }
}
