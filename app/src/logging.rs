//! Tracing subscriber setup, driven by environment:
//! - `RL_LOG_LEVEL`: filter directive (default `info`, `debug` under `--debug`)
//! - `RL_LOG_FORMAT`: `compact` (default) or `json`
//!
//! Events go to stderr. Stdout carries command output and the serve stream.

use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "RL_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "RL_LOG_FORMAT";

static LOGGING: OnceLock<LoggingConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env(debug: bool) -> Self {
        Self::from_lookup(debug, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(debug: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        let level = lookup(ENV_LOG_LEVEL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string());
        Self { format, level }
    }
}

/// Install the global subscriber. Fails when called twice or when the level
/// directive does not parse.
pub fn init_logging(debug: bool) -> Result<()> {
    let config = LoggingConfig::from_env(debug);
    LOGGING
        .set(config.clone())
        .map_err(|_| anyhow!("logging already initialized"))?;

    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid {ENV_LOG_LEVEL} {:?}", config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow!("install tracing subscriber: {e}"))?;

    tracing::debug!(format = ?config.format, level = %config.level, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = LoggingConfig::from_lookup(false, lookup(&[]));
        assert_eq!(c.format, LogFormat::Compact);
        assert_eq!(c.level, "info");
        assert_eq!(LoggingConfig::from_lookup(true, lookup(&[])).level, "debug");
    }

    #[test]
    fn env_wins_over_debug_flag() {
        let c = LoggingConfig::from_lookup(
            true,
            lookup(&[(ENV_LOG_LEVEL, "rl_core=trace"), (ENV_LOG_FORMAT, "json")]),
        );
        assert_eq!(c.format, LogFormat::Json);
        assert_eq!(c.level, "rl_core=trace");
    }

    #[test]
    fn blank_level_and_unknown_format_fall_back() {
        let c = LoggingConfig::from_lookup(false, lookup(&[(ENV_LOG_LEVEL, " "), (ENV_LOG_FORMAT, "xml")]));
        assert_eq!(c.level, "info");
        assert_eq!(c.format, LogFormat::Compact);
    }
}
