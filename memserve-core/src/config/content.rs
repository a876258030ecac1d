//! Content store and compression configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory to serve
    /// Env: MEMSERVE_WEB_ROOT
    /// Default: "./public"
    pub web_root: String,

    /// Load the whole tree into memory (false: read from disk per request)
    /// Env: MEMSERVE_USE_MEMORY
    /// Default: true
    pub use_memory: bool,

    /// Gzip responses for clients that accept it
    /// Env: MEMSERVE_GZIP
    /// Default: true
    pub gzip: bool,

    /// Smallest body worth compressing, in bytes
    /// Env: MEMSERVE_GZIP_MIN
    /// Default: 0
    pub gzip_min_bytes: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self { web_root: "./public".to_string(), use_memory: true, gzip: true, gzip_min_bytes: 0 }
    }
}

impl ContentConfig {
    pub(crate) fn apply_env_with<F>(&mut self, var: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = var("MEMSERVE_WEB_ROOT") {
            self.web_root = root;
        }

        let use_memory =
            var("MEMSERVE_USE_MEMORY").and_then(|v| env_flag("MEMSERVE_USE_MEMORY", &v));
        if let Some(flag) = use_memory {
            self.use_memory = flag;
        }

        if let Some(flag) = var("MEMSERVE_GZIP").and_then(|v| env_flag("MEMSERVE_GZIP", &v)) {
            self.gzip = flag;
        }

        let gzip_min = var("MEMSERVE_GZIP_MIN").and_then(|v| env_value("MEMSERVE_GZIP_MIN", &v));
        if let Some(min) = gzip_min {
            self.gzip_min_bytes = min;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.web_root.trim().is_empty() {
            bail!("Invalid web_root: cannot be empty");
        }
        Ok(())
    }
}

/// Lenient boolean for environment variables
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Boolean environment override; unparseable values are ignored with a warning.
pub(crate) fn env_flag(name: &str, value: &str) -> Option<bool> {
    let flag = parse_bool(value);
    if flag.is_none() {
        log::warn!("Ignoring {}={:?}: expected true/false", name, value);
    }
    flag
}

/// Typed environment override; unparseable values are ignored with a warning.
pub(crate) fn env_value<T>(name: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", name, value, e);
            None
        }
    }
}
