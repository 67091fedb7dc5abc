//! Configuration types for L402 servers and clients.
//!
//! Both sides talk to a payment backend, described by [`BackendConfig`]. The server adds a
//! static price and description ([`ServerConfig`]); the client adds its spend ceiling
//! ([`ClientConfig`]). Dynamic pricing is code-only and lives in `l402-axum`.
//!
//! # Environment Variable Resolution
//!
//! Secrets such as the backend macaroon can be kept out of configuration files with
//! [`LiteralOrEnv`]:
//!
//! ```json
//! {
//!   "backend": {
//!     "url": "https://localhost:8080",
//!     "macaroon": "$LND_MACAROON",
//!     "accept_invalid_certs": true
//!   },
//!   "price": 100
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Connection details for the external payment backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL of the backend REST gateway.
    pub url: Url,
    /// Hex-encoded macaroon sent with every backend request, if the backend requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaroon: Option<LiteralOrEnv<String>>,
    /// Skip TLS certificate validation for this backend only.
    ///
    /// Intended for nodes with self-signed certificates. Applies to the HTTP client
    /// dedicated to this backend, never to any other connection.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Timeout for each backend call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl BackendConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            macaroon: None,
            accept_invalid_certs: false,
            timeout_ms: None,
        }
    }

    /// Per-call timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Server-side configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    pub backend: BackendConfig,
    /// Static price in satoshis. Validated per request; zero is rejected as an internal error.
    pub price: u64,
    /// Invoice memo. Defaults to `"<METHOD> <path>"` of the challenged request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Client-side configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    /// Highest price, in satoshis, the client pays without caller intervention.
    #[serde(default = "config_defaults::default_max_price")]
    pub max_price: u64,
    /// Timeout for each request to a protected resource, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            max_price: config_defaults::default_max_price(),
            request_timeout_ms: None,
        }
    }

    /// Per-request timeout, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

pub mod config_defaults {
    use std::env;

    pub const DEFAULT_MAX_PRICE: u64 = 10_000;

    /// Returns the default spend ceiling with fallback: $L402_MAX_PRICE env var -> 10000
    pub fn default_max_price() -> u64 {
        env::var("L402_MAX_PRICE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_PRICE)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Loads any configuration type from a JSON file.
pub fn load_from_path<T, P>(path: P) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

// ============================================================================
// Environment Variable Resolution
// ============================================================================

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"0201036c6e6402f801..."`
/// - Simple env var: `"$LND_MACAROON"`
/// - Braced env var: `"${LND_MACAROON}"`
///
/// The wrapper implements `Deref` to provide transparent access to the inner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    /// Consume the wrapper and return the inner value
    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if the string matches `$VAR` or `${VAR}` syntax.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(braced)
        } else if let Some(var_name) = s.strip_prefix('$') {
            let is_name =
                !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_');
            is_name.then_some(var_name)
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?
        } else {
            s
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_config_defaults() {
        let config: ClientConfig = serde_json::from_value(json!({
            "backend": { "url": "https://localhost:8080/" }
        }))
        .unwrap();
        assert_eq!(config.max_price, config_defaults::default_max_price());
        assert!(!config.backend.accept_invalid_certs);
        assert_eq!(config.backend.timeout(), None);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_server_config() {
        let config: ServerConfig = serde_json::from_value(json!({
            "backend": {
                "url": "https://localhost:8080/",
                "macaroon": "0201036c6e64",
                "accept_invalid_certs": true,
                "timeout_ms": 1500
            },
            "price": 100,
            "description": "Premium content"
        }))
        .unwrap();
        assert_eq!(config.price, 100);
        assert_eq!(config.description.as_deref(), Some("Premium content"));
        assert_eq!(
            config.backend.macaroon.as_deref().map(String::as_str),
            Some("0201036c6e64")
        );
        assert!(config.backend.accept_invalid_certs);
        assert_eq!(config.backend.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_literal_or_env_resolves_braced_variable() {
        let var = "L402_TYPES_TEST_MACAROON_BRACED";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(var, "cafe") };
        let value: LiteralOrEnv<String> =
            serde_json::from_value(json!(format!("${{{var}}}"))).unwrap();
        assert_eq!(value.as_str(), "cafe");
        let value: LiteralOrEnv<String> = serde_json::from_value(json!(format!("${var}"))).unwrap();
        assert_eq!(value.into_inner(), "cafe");
    }

    #[test]
    fn test_literal_or_env_missing_variable() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_value(json!("$L402_TYPES_TEST_SURELY_UNSET"));
        assert!(result.is_err());
    }

    #[test]
    fn test_literal_or_env_keeps_literals() {
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("a$b"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$a-b"), None);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let result: Result<ServerConfig, _> = load_from_path("/nonexistent/l402.json");
        assert!(matches!(result, Err(ConfigError::FileRead(_, _))));
    }
}
