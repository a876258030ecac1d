//! Configuration system for memserve
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Command line** flags (applied by the CLI after loading)
//! 2. **Environment variables** (`MEMSERVE_*`)
//! 3. **Config file** (`memserve.toml`)
//! 4. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use memserve_core::config::MemserveConfig;
//!
//! let config = MemserveConfig::load_from("memserve.toml")?;
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! A config file only needs the values it changes:
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [content]
//! web_root = "/srv/blog/public"
//!
//! [metrics]
//! shared = true
//! ```

pub mod content;
pub mod logging;
pub mod metrics;
pub mod server;

pub use content::ContentConfig;
pub use logging::LoggingConfig;
pub use metrics::MetricsConfig;
pub use server::ServerConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "memserve.toml";

/// Complete memserve configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemserveConfig {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl MemserveConfig {
    /// Load `memserve.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file, then apply environment
    /// variables. A missing file means defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_vars();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Apply `MEMSERVE_*` environment variables
    pub fn apply_env_vars(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.server.apply_env_with(&var);
        self.content.apply_env_with(&var);
        self.metrics.apply_env_with(&var);
        self.logging.apply_env_with(&var);
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.content.validate()?;
        self.metrics.validate(self.server.port)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_default_config() {
        let config = MemserveConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.content.web_root, "./public");
        assert!(config.content.use_memory);
        assert!(config.content.gzip);
        assert_eq!(config.metrics.listen_port(), Some(9090));
        assert!(!config.logging.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memserve.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8000\n\n[content]\nweb_root = \"/srv/blog\"\nuse_memory = false\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = MemserveConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.content.web_root, "/srv/blog");
        assert!(!config.content.use_memory);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.metrics, MetricsConfig::default());
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut expected = MemserveConfig::default();
        expected.apply_env_vars();
        let config = MemserveConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memserve.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = MemserveConfig::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("memserve.toml"));
    }

    #[test]
    fn test_env_wins_over_file() {
        let mut config: MemserveConfig = toml::from_str("[server]\nport = 8000\n").unwrap();
        config.apply_env_with(|key| match key {
            "MEMSERVE_PORT" => Some("8001".to_string()),
            "MEMSERVE_METRICS_PORT" => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.metrics.listen_port(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_collision_is_invalid() {
        let mut config = MemserveConfig::default();
        config.metrics.port = config.server.port;
        assert!(config.validate().is_err());
    }
}
