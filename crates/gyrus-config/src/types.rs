// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `gyrus_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GyrusConfig {
    pub simulation: SimulationConfig,
    pub defaults: BuildDefaultsConfig,
    pub logging: LoggingConfig,
}

/// Settings used by the execution driver when no explicit options are given
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation backend name ("cpu" or "batched")
    pub backend: String,
    /// Simulation timestep in seconds
    pub dt: f64,
    /// Where the time axis goes in probed output ("leading" or "trailing")
    pub time_axis: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backend: "cpu".to_string(),
            dt: 0.001,
            time_axis: "trailing".to_string(),
        }
    }
}

/// Process-wide defaults for configurable build parameters
///
/// These are the values the configuration resolver falls back to when no
/// overlay upstream of a node defines a parameter. Keys registered by
/// user-defined element builders can be given defaults through `extra`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildDefaultsConfig {
    pub n_neurons: i64,
    pub radius: f64,
    pub neuron_type: String,
    pub seed: i64,
    pub synapse: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

impl Default for BuildDefaultsConfig {
    fn default() -> Self {
        Self {
            n_neurons: 100,
            radius: 1.0,
            neuron_type: "direct".to_string(),
            seed: 0,
            synapse: 0.005,
            extra: BTreeMap::new(),
        }
    }
}

impl BuildDefaultsConfig {
    /// Flatten into `(key, value)` pairs, builtin keys first
    pub fn entries(&self) -> Vec<(String, ConfigValue)> {
        let mut entries = vec![
            ("n_neurons".to_string(), ConfigValue::Int(self.n_neurons)),
            ("radius".to_string(), ConfigValue::Float(self.radius)),
            (
                "neuron_type".to_string(),
                ConfigValue::Str(self.neuron_type.clone()),
            ),
            ("seed".to_string(), ConfigValue::Int(self.seed)),
            ("synapse".to_string(), ConfigValue::Float(self.synapse)),
        ];
        entries.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        entries
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format ("text" or "json")
    pub format: String,
    /// Crates that should log at debug level
    pub debug_crates: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            debug_crates: Vec::new(),
        }
    }
}

/// A single configurable parameter value
///
/// Untagged so TOML scalars map directly: `n_neurons = 50`, `radius = 1.5`,
/// `neuron_type = "lif_rate"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; nothing else converts
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<usize> for ConfigValue {
    fn from(v: usize) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_values_parse_from_toml() {
        let parsed: BuildDefaultsConfig = toml::from_str(
            r#"
            n_neurons = 50
            neuron_type = "lif_rate"
            tau_rise = 0.002
            use_bias = true
            "#,
        )
        .unwrap();
        assert_eq!(parsed.n_neurons, 50);
        assert_eq!(parsed.neuron_type, "lif_rate");
        assert_eq!(parsed.radius, 1.0);
        assert_eq!(parsed.extra.get("tau_rise"), Some(&ConfigValue::Float(0.002)));
        assert_eq!(parsed.extra.get("use_bias"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(ConfigValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ConfigValue::Float(3.0).as_i64(), None);
        assert_eq!(ConfigValue::Str("x".into()).as_f64(), None);
    }
}
