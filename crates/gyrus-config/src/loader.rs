// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::validation::validate_config;
use crate::{ConfigError, ConfigResult, GyrusConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "gyrus_configuration.toml";

/// Locate `gyrus_configuration.toml`
///
/// `GYRUS_CONFIG_PATH` takes precedence when set. Otherwise the working
/// directory and its ancestors (at most five levels up) are checked in order.
///
/// # Errors
///
/// `ConfigError::NotFound` carries every path that was tried.
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(explicit) = env::var("GYRUS_CONFIG_PATH") {
        let path = PathBuf::from(explicit);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound(format!(
                "GYRUS_CONFIG_PATH={}",
                path.display()
            )))
        };
    }

    let candidates: Vec<PathBuf> = env::current_dir()
        .map(|cwd| {
            cwd.ancestors()
                .take(6)
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .collect()
        })
        .unwrap_or_default();

    match candidates.iter().find(|candidate| candidate.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(ConfigError::NotFound(
            candidates
                .iter()
                .map(|candidate| candidate.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

/// Load configuration from a TOML file, apply overrides, and validate
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<GyrusConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: GyrusConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Like [`load_config`] with file discovery, but a missing file yields the defaults
///
/// Overrides and validation still apply to the defaults.
pub fn load_config_or_default(
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<GyrusConfig> {
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::NotFound(_)) => {
            let mut config = GyrusConfig::default();
            apply_environment_overrides(&mut config);
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli);
            }
            validate_config(&config)?;
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

/// Environment variables and the override keys they map to
const ENVIRONMENT_OVERRIDES: &[(&str, &str)] = &[
    ("GYRUS_BACKEND", "backend"),
    ("GYRUS_DT", "dt"),
    ("GYRUS_LOG_LEVEL", "log_level"),
    ("GYRUS_SEED", "seed"),
    ("GYRUS_NEURON_TYPE", "neuron_type"),
];

/// Apply `GYRUS_*` environment overrides
///
/// Recognized variables: `GYRUS_BACKEND`, `GYRUS_DT`, `GYRUS_LOG_LEVEL`,
/// `GYRUS_SEED` and `GYRUS_NEURON_TYPE`. Unparseable numbers are ignored.
pub fn apply_environment_overrides(config: &mut GyrusConfig) {
    for (variable, key) in ENVIRONMENT_OVERRIDES {
        if let Ok(value) = env::var(variable) {
            set_override(config, key, &value);
        }
    }
}

/// Apply command-line overrides such as `{"backend": "batched", "dt": "0.0005"}`
///
/// Keys: `backend`, `dt`, `time_axis`, `log_level`, `seed`, `n_neurons`
/// and `neuron_type`. Anything else is ignored.
pub fn apply_cli_overrides(config: &mut GyrusConfig, cli_args: &HashMap<String, String>) {
    for (key, value) in cli_args {
        set_override(config, key, value);
    }
}

fn set_override(config: &mut GyrusConfig, key: &str, value: &str) {
    match key {
        "backend" => config.simulation.backend = value.to_string(),
        "time_axis" => config.simulation.time_axis = value.to_string(),
        "log_level" => config.logging.level = value.to_string(),
        "neuron_type" => config.defaults.neuron_type = value.to_string(),
        "dt" => {
            if let Ok(dt) = value.parse() {
                config.simulation.dt = dt;
            }
        }
        "seed" => {
            if let Ok(seed) = value.parse() {
                config.defaults.seed = seed;
            }
        }
        "n_neurons" => {
            if let Ok(n) = value.parse() {
                config.defaults.n_neurons = n;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("GYRUS_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("GYRUS_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("GYRUS_BACKEND");
        env::remove_var("GYRUS_DT");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "backend = \"batched\"").unwrap();
        writeln!(file, "dt = 0.0005").unwrap();
        writeln!(file, "[defaults]").unwrap();
        writeln!(file, "n_neurons = 64").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.simulation.backend, "batched");
        assert_eq!(config.simulation.dt, 0.0005);
        assert_eq!(config.defaults.n_neurons, 64);
        assert_eq!(config.defaults.neuron_type, "direct");
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("GYRUS_DT");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "dt = -1.0").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = GyrusConfig::default();

        env::set_var("GYRUS_BACKEND", "batched");
        env::set_var("GYRUS_SEED", "17");

        apply_environment_overrides(&mut config);

        env::remove_var("GYRUS_BACKEND");
        env::remove_var("GYRUS_SEED");

        assert_eq!(config.simulation.backend, "batched");
        assert_eq!(config.defaults.seed, 17);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "backend = \"cpu\"").unwrap();
        writeln!(file, "dt = 0.01").unwrap();

        env::set_var("GYRUS_BACKEND", "batched");
        env::set_var("GYRUS_DT", "0.002");

        let mut cli_args = HashMap::new();
        cli_args.insert("backend".to_string(), "cpu".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("GYRUS_BACKEND");
        env::remove_var("GYRUS_DT");

        // CLI wins for backend, env wins for dt (no CLI override)
        assert_eq!(config.simulation.backend, "cpu");
        assert_eq!(config.simulation.dt, 0.002);
    }
}
