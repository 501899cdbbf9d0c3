//! AI API reverse proxy configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reverse proxy configuration.
///
/// The secret itself is never stored here: only the name of the environment
/// variable holding it, which is read on every proxied request.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Upstream base URL; the path after `/api/openai/` is appended to it.
    #[serde(default = "default_upstream_base_url")]
    #[validate(url)]
    pub upstream_base_url: String,
    /// Environment variable holding the server-side API key.
    #[serde(default = "default_api_key_env")]
    #[validate(length(min = 1))]
    pub api_key_env: String,
    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_seconds: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: default_upstream_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ProxyConfig {
    /// Read the server-side secret. Empty values count as absent.
    pub fn server_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_upstream_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ProxyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_env_var_yields_none() {
        let config = ProxyConfig {
            api_key_env: "LDGRADNJA_TEST_UNSET_PROXY_KEY_7F3A".to_string(),
            ..Default::default()
        };
        assert!(config.server_api_key().is_none());
    }

    #[test]
    fn test_invalid_upstream_url_rejected() {
        let config = ProxyConfig {
            upstream_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
