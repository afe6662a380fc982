// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Range and vocabulary checks for loaded configuration

use crate::{ConfigError, ConfigResult, GyrusConfig};

/// Backend names accepted by the execution driver
pub const KNOWN_BACKENDS: &[&str] = &["cpu", "reference", "batched", "gpu"];

/// Neuron types accepted for nonlinear approximation
pub const KNOWN_NEURON_TYPES: &[&str] = &["direct", "lif_rate"];

const TIME_AXES: &[&str] = &["leading", "trailing"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// One rejected field
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{field} = '{value}' is not one of {}", .allowed.join("|"))]
    NotOneOf {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("{field} {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}

/// Accumulates every rejected field before reporting
#[derive(Default)]
struct Problems(Vec<ConfigValidationError>);

impl Problems {
    fn one_of(&mut self, field: &'static str, value: &str, allowed: &'static [&'static str]) {
        if !allowed.contains(&value.to_lowercase().as_str()) {
            self.0.push(ConfigValidationError::NotOneOf {
                field,
                value: value.to_string(),
                allowed,
            });
        }
    }

    fn require(&mut self, holds: bool, field: &'static str, requirement: &'static str) {
        if !holds {
            self.0
                .push(ConfigValidationError::OutOfRange { field, requirement });
        }
    }
}

/// Check every section, reporting all problems at once
///
/// # Errors
///
/// `ConfigError::Invalid` with one line per rejected field.
pub fn validate_config(config: &GyrusConfig) -> ConfigResult<()> {
    let mut problems = Problems::default();

    let simulation = &config.simulation;
    problems.one_of("simulation.backend", &simulation.backend, KNOWN_BACKENDS);
    problems.one_of("simulation.time_axis", &simulation.time_axis, TIME_AXES);
    problems.require(simulation.dt > 0.0, "simulation.dt", "must be positive");

    let defaults = &config.defaults;
    problems.require(defaults.n_neurons > 0, "defaults.n_neurons", "must be positive");
    problems.require(defaults.radius > 0.0, "defaults.radius", "must be positive");
    problems.require(defaults.seed >= 0, "defaults.seed", "must not be negative");
    problems.require(defaults.synapse >= 0.0, "defaults.synapse", "must not be negative");
    problems.one_of("defaults.neuron_type", &defaults.neuron_type, KNOWN_NEURON_TYPES);

    problems.one_of("logging.level", &config.logging.level, LOG_LEVELS);
    problems.one_of("logging.format", &config.logging.format, LOG_FORMATS);

    if problems.0.is_empty() {
        return Ok(());
    }
    let lines: Vec<String> = problems.0.iter().map(ToString::to_string).collect();
    Err(ConfigError::Invalid(lines.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GyrusConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = GyrusConfig::default();
        config.simulation.backend = "tpu".to_string();

        let result = validate_config(&config);
        if let Err(ConfigError::Invalid(msg)) = result {
            assert!(msg.contains("simulation.backend"));
            assert!(msg.contains("batched"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_backend_names_are_case_insensitive() {
        let mut config = GyrusConfig::default();
        config.simulation.backend = "CPU".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let mut config = GyrusConfig::default();
        config.defaults.n_neurons = 0;
        config.defaults.radius = -1.0;
        config.defaults.neuron_type = "spiking".to_string();

        match validate_config(&config) {
            Err(ConfigError::Invalid(msg)) => {
                assert!(msg.contains("defaults.n_neurons"));
                assert!(msg.contains("defaults.radius"));
                assert!(msg.contains("defaults.neuron_type"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_dt_rejected() {
        let mut config = GyrusConfig::default();
        config.simulation.dt = f64::NAN;
        assert!(validate_config(&config).is_err());
    }
}
