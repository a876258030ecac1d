//! Logging configuration

use serde::{Deserialize, Serialize};

use super::content::env_flag;
use crate::logging::LogFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log at debug level instead of info
    /// Env: MEMSERVE_DEBUG
    /// Default: false
    pub debug: bool,

    /// Env: MEMSERVE_LOG_FORMAT ("human" or "json")
    /// Default: human
    pub format: LogFormat,
}

impl LoggingConfig {
    pub(crate) fn apply_env_with<F>(&mut self, var: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = var("MEMSERVE_DEBUG").and_then(|v| env_flag("MEMSERVE_DEBUG", &v)) {
            self.debug = flag;
        }

        if let Some(format) = var("MEMSERVE_LOG_FORMAT") {
            match format.parse() {
                Ok(f) => self.format = f,
                Err(e) => log::warn!("Ignoring MEMSERVE_LOG_FORMAT: {}", e),
            }
        }
    }
}
