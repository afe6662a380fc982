// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Configuration Resolver
//!
//! Effective value of a configurable parameter `p` for node `n`:
//!
//! 1. a value passed explicitly when `n` was constructed
//! 2. the nearest configure overlay upstream of `n` that defines `p`
//! 3. the process-wide default
//!
//! "Nearest" is a breadth-by-distance walk over the input DAG. Candidates at
//! one distance are ordered by left-to-right expansion of the previous
//! distance, each node is visited once, and the first overlay defining `p`
//! wins. Under diamond sharing the shorter path wins; among equally short
//! paths, the one through the leftmost input wins.

use ahash::AHashSet;
use gyrus_config::{BuildDefaultsConfig, ConfigValue};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::ConfigurationError;
use crate::node::Node;

/// Named parameter values (explicit per-call values, overlays, handler keywords)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, ConfigValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Integer keyword, `default` when absent
    pub(crate) fn int_or(&self, op: &str, key: &str, default: i64) -> crate::GraphResult<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.as_i64().ok_or_else(|| {
                crate::GraphError::bad_arguments(
                    op,
                    format!("'{}' must be an int, got {}", key, value.type_name()),
                )
            }),
        }
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Fallback values for configurable parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDefaults {
    values: BTreeMap<String, ConfigValue>,
}

static GLOBAL_DEFAULTS: Lazy<RwLock<ConfigDefaults>> =
    Lazy::new(|| RwLock::new(ConfigDefaults::default()));

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self::from_config(&BuildDefaultsConfig::default())
    }
}

impl ConfigDefaults {
    /// Defaults from the `[defaults]` section of the configuration file
    pub fn from_config(config: &BuildDefaultsConfig) -> Self {
        Self {
            values: config.entries().into_iter().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Whether `key` is a known configurable parameter
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Snapshot of the process-wide defaults
    pub fn global() -> ConfigDefaults {
        GLOBAL_DEFAULTS.read().clone()
    }

    /// Replace the process-wide defaults
    pub fn set_global(defaults: ConfigDefaults) {
        *GLOBAL_DEFAULTS.write() = defaults;
    }

    /// Add or change one process-wide default, e.g. for a parameter of a
    /// user-defined element
    pub fn declare_global(key: impl Into<String>, value: impl Into<ConfigValue>) {
        GLOBAL_DEFAULTS.write().set(key, value);
    }
}

/// Nearest upstream overlay value for `key`, excluding `node`'s own overlay
pub fn nearest_overlay<'a>(node: &'a Node, key: &str) -> Option<&'a ConfigValue> {
    nearest_overlays(node, &[key]).remove(key)
}

/// Nearest upstream overlay value for each of `keys`, found in one walk
///
/// Inputs are visited breadth-first by distance, left to right within a
/// distance, each node once. The walk stops as soon as every key is found.
pub fn nearest_overlays<'a, 'k>(
    node: &'a Node,
    keys: &[&'k str],
) -> BTreeMap<&'k str, &'a ConfigValue> {
    let mut found = BTreeMap::new();
    if keys.is_empty() {
        return found;
    }
    let mut visited: AHashSet<crate::NodeId> = AHashSet::new();
    visited.insert(node.id());
    let mut frontier: Vec<&'a Node> = node
        .inputs()
        .iter()
        .filter(|input| visited.insert(input.id()))
        .collect();

    while !frontier.is_empty() {
        for &n in &frontier {
            if n.overlay().is_empty() {
                continue;
            }
            for &key in keys {
                if found.contains_key(key) {
                    continue;
                }
                if let Some(value) = n.overlay().get(key) {
                    found.insert(key, value);
                }
            }
        }
        if found.len() == keys.len() {
            break;
        }
        let mut next = Vec::new();
        for &n in &frontier {
            for input in n.inputs() {
                if visited.insert(input.id()) {
                    next.push(input);
                }
            }
        }
        frontier = next;
    }
    found
}

/// Resolve every configurable parameter of `node`
///
/// Explicit keys the node's kind does not declare are rejected, as are
/// parameters with no value anywhere.
pub fn resolve(
    node: &Node,
    configurable: &[&str],
    defaults: &ConfigDefaults,
) -> Result<ResolvedConfig, ConfigurationError> {
    let kind = node.op_kind().to_string();
    let explicit = node.explicit_params();
    if let Some(key) = explicit.keys().find(|k| !configurable.contains(k)) {
        return Err(ConfigurationError::UnknownParameter {
            key: key.to_string(),
            kind,
        });
    }

    let inherited: Vec<&str> = configurable
        .iter()
        .copied()
        .filter(|key| !explicit.contains_key(key))
        .collect();
    let overlays = nearest_overlays(node, &inherited);

    let mut values = BTreeMap::new();
    for &key in configurable {
        let value = explicit
            .get(key)
            .or_else(|| overlays.get(key).copied())
            .or_else(|| defaults.get(key))
            .ok_or_else(|| ConfigurationError::MissingValue {
                key: key.to_string(),
                kind: kind.clone(),
            })?;
        values.insert(key.to_string(), value.clone());
    }
    Ok(ResolvedConfig { kind, values })
}

/// Check that every key of an overlay names a known parameter
pub fn check_overlay(node: &Node, defaults: &ConfigDefaults) -> Result<(), ConfigurationError> {
    match node.overlay().keys().find(|k| !defaults.contains(k)) {
        Some(key) => Err(ConfigurationError::UnknownParameter {
            key: key.to_string(),
            kind: node.op_kind().to_string(),
        }),
        None => Ok(()),
    }
}

/// Effective configuration handed to an element's lowering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    kind: String,
    values: BTreeMap<String, ConfigValue>,
}

impl ResolvedConfig {
    pub fn get(&self, key: &str) -> Result<&ConfigValue, ConfigurationError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigurationError::UnknownParameter {
                key: key.to_string(),
                kind: self.kind.clone(),
            })
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ConfigurationError> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| invalid(key, "a number", value))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ConfigurationError> {
        let value = self.get(key)?;
        value.as_i64().ok_or_else(|| invalid(key, "an int", value))
    }

    /// Non-negative integer
    pub fn get_usize(&self, key: &str) -> Result<usize, ConfigurationError> {
        let value = self.get(key)?;
        value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| invalid(key, "a non-negative int", value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigurationError> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| invalid(key, "a bool", value))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigurationError> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| invalid(key, "a string", value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn invalid(key: &str, expected: &str, found: &ConfigValue) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_string(),
        expected: expected.to_string(),
        found: format!("{} {}", found.type_name(), found),
    }
}
