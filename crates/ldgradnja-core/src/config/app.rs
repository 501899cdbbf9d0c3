//! Server and CORS configuration.

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_seconds: default_shutdown_grace(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins (`["*"]` allows any origin).
    #[serde(default = "default_wildcard")]
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods (`["*"]` allows any method).
    #[serde(default = "default_wildcard")]
    pub allowed_methods: Vec<String>,
    /// Allowed HTTP headers (`["*"]` allows any header).
    #[serde(default = "default_wildcard")]
    pub allowed_headers: Vec<String>,
    /// Exposed response headers. The fallback headers must be readable by
    /// the browser frontend.
    #[serde(default = "default_exposed_headers")]
    pub exposed_headers: Vec<String>,
    /// Max age for preflight cache in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_wildcard(),
            allowed_methods: default_wildcard(),
            allowed_headers: default_wildcard(),
            exposed_headers: default_exposed_headers(),
            max_age_seconds: default_max_age(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_exposed_headers() -> Vec<String> {
    vec![
        "content-disposition".to_string(),
        "x-fallback".to_string(),
        "x-error".to_string(),
    ]
}

fn default_max_age() -> u64 {
    3600
}
