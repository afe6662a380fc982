// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # gyrus Configuration System
//!
//! Type-safe configuration for graph materialization and simulation:
//! - TOML file parsing (`gyrus_configuration.toml`)
//! - Environment variable overrides (`GYRUS_*`)
//! - CLI argument overrides
//! - Validation of build defaults and simulation settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gyrus_config::{load_config, GyrusConfig};
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("backend: {}", config.simulation.backend);
//! println!("dt: {}", config.simulation.dt);
//! ```
//!
//! `GyrusConfig::default()` is always valid, so library users that never
//! ship a configuration file can skip the loader entirely.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_config_or_default, CONFIG_FILE_NAME,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Failure to locate, read, parse or validate a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No gyrus_configuration.toml found (searched {0})")]
    NotFound(String),

    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration rejected: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
