//! Metrics listener configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Port of the dedicated metrics listener
    /// Env: MEMSERVE_METRICS_PORT ("off" serves /metrics on the content port)
    /// Default: 9090
    pub port: u16,

    /// Serve `/metrics` on the content port instead of a dedicated listener
    /// Default: false
    pub shared: bool,

    /// Prefix of every metric name
    /// Env: MEMSERVE_METRICS_NAMESPACE
    /// Default: "memserve"
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090, shared: false, namespace: "memserve".to_string() }
    }
}

impl MetricsConfig {
    /// Port of the dedicated listener, `None` when metrics share the content port
    pub fn listen_port(&self) -> Option<u16> {
        if self.shared {
            None
        } else {
            Some(self.port)
        }
    }

    /// Apply a port override: a number, or `off`/`none`/`shared`.
    pub fn set_port(&mut self, value: &str) -> Result<()> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "shared" => self.shared = true,
            other => {
                self.port = other
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid metrics port '{}'", value))?;
                self.shared = false;
            }
        }
        Ok(())
    }

    pub(crate) fn apply_env_with<F>(&mut self, var: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = var("MEMSERVE_METRICS_PORT") {
            if let Err(e) = self.set_port(&port) {
                log::warn!("Ignoring MEMSERVE_METRICS_PORT: {}", e);
            }
        }

        if let Some(namespace) = var("MEMSERVE_METRICS_NAMESPACE") {
            self.namespace = namespace;
        }
    }

    pub fn validate(&self, content_port: u16) -> Result<()> {
        if let Some(port) = self.listen_port() {
            if port == 0 {
                bail!("Invalid metrics port: port must be between 1 and 65535");
            }
            if port == content_port {
                bail!("Metrics port {} collides with the content port", port);
            }
        }

        let valid_namespace = !self.namespace.is_empty()
            && !self.namespace.starts_with(|c: char| c.is_ascii_digit())
            && self.namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
        if !valid_namespace {
            bail!("Invalid metrics namespace '{}'", self.namespace);
        }
        Ok(())
    }
}
