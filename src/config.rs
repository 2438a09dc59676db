//! Configuration Module
//!
//! Handles loading process configuration from environment variables.

use std::env;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::cache::{DEFAULT_DOC_EXPIRES_MS, DEFAULT_MEMORY_EXPIRES_MS};
use crate::error::{CacheError, Result};

/// Process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Initial global cache status (`active` enables, anything else disables)
    pub cache_status: String,
    /// Default TTL for the data cache in milliseconds
    pub data_cache_expires_ms: u64,
    /// Default TTL for the view cache in milliseconds
    pub view_cache_expires_ms: u64,
    /// Directory for the flat-file view store; in-memory views when unset
    pub view_cache_dir: Option<PathBuf>,
    /// Option overrides merged onto the built-in defaults
    pub cache_options: Map<String, Value>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 1)
    /// - `CACHE_STATUS` - Initial cache status (default: active)
    /// - `DATA_CACHE_EXPIRES_MS` - Data cache default TTL (default: 60000)
    /// - `VIEW_CACHE_EXPIRES_MS` - View cache default TTL (default: 300000)
    /// - `VIEW_CACHE_DIR` - Flat-file view store directory (default: unset)
    /// - `CACHE_OPTIONS` - JSON object of option overrides (default: `{}`)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cache_options = match env::var("CACHE_OPTIONS") {
            Ok(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|err| CacheError::InvalidOption {
                    key: "CACHE_OPTIONS".to_string(),
                    reason: err.to_string(),
                })?
            }
            _ => Map::new(),
        };

        Ok(Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            cache_status: env::var("CACHE_STATUS").unwrap_or(defaults.cache_status),
            data_cache_expires_ms: parse_var("DATA_CACHE_EXPIRES_MS")
                .unwrap_or(defaults.data_cache_expires_ms),
            view_cache_expires_ms: parse_var("VIEW_CACHE_EXPIRES_MS")
                .unwrap_or(defaults.view_cache_expires_ms),
            view_cache_dir: env::var_os("VIEW_CACHE_DIR").map(PathBuf::from),
            cache_options,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            cache_status: "active".to_string(),
            data_cache_expires_ms: DEFAULT_MEMORY_EXPIRES_MS,
            view_cache_expires_ms: DEFAULT_DOC_EXPIRES_MS,
            view_cache_dir: None,
            cache_options: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.cache_status, "active");
        assert_eq!(config.data_cache_expires_ms, 60_000);
        assert_eq!(config.view_cache_expires_ms, 300_000);
        assert!(config.view_cache_dir.is_none());
        assert!(config.cache_options.is_empty());
    }

    // Single test touching the environment so parallel tests don't race on it.
    #[test]
    fn test_config_from_env() {
        env::remove_var("SERVER_PORT");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("CACHE_STATUS");
        env::remove_var("VIEW_CACHE_DIR");
        env::set_var("CACHE_OPTIONS", r#"{"item_doc_cache_expires": 1000}"#);

        let config = Config::from_env().unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cache_status, "active");
        assert_eq!(
            config.cache_options.get("item_doc_cache_expires"),
            Some(&Value::from(1000))
        );

        env::set_var("CACHE_OPTIONS", "[1, 2]");
        assert!(matches!(
            Config::from_env(),
            Err(CacheError::InvalidOption { .. })
        ));

        env::remove_var("CACHE_OPTIONS");
        assert!(Config::from_env().unwrap().cache_options.is_empty());
    }
}
