//! Listener configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::content::env_value;
use crate::http::{TrustedProxies, DEFAULT_TRUSTED_PROXIES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address
    /// Env: MEMSERVE_HOST
    /// Default: "0.0.0.0"
    pub host: String,

    /// Content port
    /// Env: MEMSERVE_PORT
    /// Default: 8080
    pub port: u16,

    /// Time allowed for a client to send request headers, in seconds
    /// Env: MEMSERVE_HEADER_TIMEOUT
    /// Default: 30
    pub header_read_timeout_secs: u64,

    /// Peers allowed to set X-Forwarded-For / X-Real-IP (CIDRs or addresses)
    /// Env: MEMSERVE_TRUSTED_PROXIES (comma-separated)
    /// Default: loopback and private networks
    pub trusted_proxies: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            header_read_timeout_secs: 30,
            trusted_proxies: DEFAULT_TRUSTED_PROXIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    pub(crate) fn apply_env_with<F>(&mut self, var: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("MEMSERVE_HOST") {
            self.host = host;
        }

        if let Some(port) = var("MEMSERVE_PORT").and_then(|v| env_value("MEMSERVE_PORT", &v)) {
            self.port = port;
        }

        if let Some(timeout) =
            var("MEMSERVE_HEADER_TIMEOUT").and_then(|v| env_value("MEMSERVE_HEADER_TIMEOUT", &v))
        {
            self.header_read_timeout_secs = timeout;
        }

        if let Some(proxies) = var("MEMSERVE_TRUSTED_PROXIES") {
            self.trusted_proxies = proxies
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    pub fn trusted_proxies(&self) -> Result<TrustedProxies> {
        TrustedProxies::parse(self.trusted_proxies.as_slice())
    }

    /// `host:port` of the content listener
    pub fn bind_addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Invalid port: port must be between 1 and 65535");
        }

        if self.host.is_empty() {
            bail!("Invalid host: host cannot be empty");
        }

        if self.header_read_timeout_secs == 0 {
            bail!("Invalid header_read_timeout_secs: must be greater than 0");
        }

        self.trusted_proxies()?;
        Ok(())
    }
}

/// Format an address for `TcpListener::bind`, bracketing bare IPv6 hosts.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
