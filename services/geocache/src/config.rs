//! Service configuration loaded from `GEOCACHE_*` environment variables

use config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "GEOCACHE";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Where users and caches are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Service configuration
///
/// # Environment Variables
/// - `GEOCACHE_HOST`: Listen address (default: 0.0.0.0)
/// - `GEOCACHE_PORT`: Listen port (default: 5000)
/// - `GEOCACHE_STORAGE`: `postgres` or `memory` (default: postgres)
/// - `GEOCACHE_LOG_LEVEL`: Fallback log filter when `RUST_LOG` is unset (default: info)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("storage", "postgres")?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "GEOCACHE_HOST",
        "GEOCACHE_PORT",
        "GEOCACHE_STORAGE",
        "GEOCACHE_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = AppConfig::load().unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:5000");
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("GEOCACHE_HOST", "127.0.0.1");
            std::env::set_var("GEOCACHE_PORT", "8080");
            std::env::set_var("GEOCACHE_STORAGE", "memory");
            std::env::set_var("GEOCACHE_LOG_LEVEL", "debug");
        }

        let config = AppConfig::load().unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.log_level, "debug");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("GEOCACHE_PORT", "not-a-port");
        }

        assert!(AppConfig::load().is_err());

        clear_env();
    }
}
