//! Logging setup
//!
//! Everything logs through the standard `log` macros; this module installs
//! `env_logger` as the backend with either a human-readable or a JSON line
//! format. `RUST_LOG` overrides the configured level, for example
//! `RUST_LOG=info,memserve::access=off` to silence the access log.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

use crate::config::LoggingConfig;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `2024-01-15 10:30:00.123 INFO  [memserve::access] ...`
    #[default]
    Human,
    /// One JSON object per line: timestamp, level, target, message
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log format '{0}' (expected 'human' or 'json')")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Install the global logger. Safe to call more than once; later calls are
/// ignored.
pub fn init_logging(config: &LoggingConfig) {
    let level = if config.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    let render: fn(DateTime<Utc>, log::Level, &str, &str) -> String = match config.format {
        LogFormat::Human => human_line,
        LogFormat::Json => json_line,
    };
    builder.format(move |buf, record| {
        let message = record.args().to_string();
        writeln!(buf, "{}", render(Utc::now(), record.level(), record.target(), &message))
    });

    let _ = builder.try_init();
}

fn human_line(timestamp: DateTime<Utc>, level: log::Level, target: &str, message: &str) -> String {
    format!(
        "{} {:5} [{}] {}",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        target,
        message
    )
}

fn json_line(timestamp: DateTime<Utc>, level: log::Level, target: &str, message: &str) -> String {
    let mut json = serde_json::Map::new();
    json.insert(
        "timestamp".to_string(),
        serde_json::Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    json.insert("level".to_string(), serde_json::Value::String(level.to_string()));
    json.insert("target".to_string(), serde_json::Value::String(target.to_string()));
    json.insert("message".to_string(), serde_json::Value::String(message.to_string()));
    serde_json::Value::Object(json).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Human ".parse::<LogFormat>().unwrap(), LogFormat::Human);
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("xml"));
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_human_line() {
        let line = human_line(at(), log::Level::Info, "memserve::access", "hello");
        assert_eq!(line, "2024-01-15 10:30:00.000 INFO  [memserve::access] hello");
    }

    #[test]
    fn test_json_line_escapes_message() {
        let line = json_line(at(), log::Level::Warn, "memserve_core::store", "bad \"file\"\n");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["timestamp"], "2024-01-15T10:30:00.000Z");
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "memserve_core::store");
        assert_eq!(value["message"], "bad \"file\"\n");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
