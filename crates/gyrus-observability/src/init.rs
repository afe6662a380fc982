// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Installs a global `tracing` subscriber writing either human-readable or
//! JSON lines to stderr, filtered per crate.

use anyhow::{anyhow, Context, Result};
use gyrus_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{debug_targets_from_env, DebugTargets};

/// Output format of the console subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("unknown log format: {}", other)),
        }
    }
}

/// Initialize the global subscriber
///
/// `RUST_LOG`, when set, replaces the filter derived from the flags.
///
/// # Errors
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(debug: &DebugTargets, base_level: &str, format: LogFormat) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives),
        Err(_) => EnvFilter::try_new(debug.directives(base_level)),
    }
    .context("Failed to build log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Initialize logging from the `[logging]` configuration section merged with
/// command-line / `GYRUS_DEBUG` flags
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    let mut debug = debug_targets_from_env();
    debug.extend(&config.debug_crates);
    let format: LogFormat = config.format.parse()?;
    init_logging(&debug, &config.level, format)
}

/// Best-effort initialization for tests: text output, ignores "already set"
pub fn init_test_logging() {
    let _ = init_logging(&DebugTargets::default(), "warn", LogFormat::Text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_second_init_reports_error() {
        init_test_logging();
        let second = init_logging(&DebugTargets::default(), "info", LogFormat::Text);
        assert!(second.is_err());
    }
}
