// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Selecting which crates log at debug level
//!
//! Targets come from `--debug-<crate>` / `--debug-all` arguments, the
//! comma-separated `GYRUS_DEBUG` variable and `logging.debug_crates`.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// `tracing` targets raised to debug level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugTargets(BTreeSet<String>);

impl DebugTargets {
    /// Targets named by `--debug-*` arguments; other arguments are skipped
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter()
            .filter_map(|arg| arg.as_ref().strip_prefix("--debug-").map(str::to_owned))
            .collect()
    }

    /// Add a crate name; `all` expands to every known crate
    pub fn insert(&mut self, name: &str) {
        match name.trim() {
            "" => {}
            "all" => self.0.extend(KNOWN_CRATES.iter().map(|c| c.to_string())),
            name => {
                self.0.insert(name.to_string());
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `EnvFilter` directives, e.g. `gyrus-graph=debug,warn` for base level `WARN`
    pub fn directives(&self, base_level: &str) -> String {
        self.0
            .iter()
            .map(|target| format!("{}=debug", target))
            .chain(std::iter::once(base_level.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for DebugTargets {
    fn from_iter<I: IntoIterator<Item = S>>(names: I) -> Self {
        let mut targets = DebugTargets::default();
        targets.extend(names);
        targets
    }
}

impl<S: AsRef<str>> Extend<S> for DebugTargets {
    fn extend<I: IntoIterator<Item = S>>(&mut self, names: I) {
        for name in names {
            self.insert(name.as_ref());
        }
    }
}

/// Targets requested by this process's arguments and `GYRUS_DEBUG`
pub fn debug_targets_from_env() -> DebugTargets {
    let mut targets = DebugTargets::from_args(env::args());
    if let Ok(requested) = env::var("GYRUS_DEBUG") {
        targets.extend(requested.split(','));
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_argument() {
        let targets = DebugTargets::from_args(["run", "--debug-gyrus-graph", "--verbose"]);
        assert!(targets.contains("gyrus-graph"));
        assert!(!targets.contains("gyrus-runtime"));
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_all_expands() {
        let targets = DebugTargets::from_args(["--debug-all"]);
        for name in KNOWN_CRATES {
            assert!(targets.contains(name), "{} missing", name);
        }
        assert!(!targets.contains("all"));
    }

    #[test]
    fn test_blank_names_skipped() {
        let targets: DebugTargets = ["gyrus-runtime", " ", ""].into_iter().collect();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_directives() {
        let targets = DebugTargets::from_args(["--debug-gyrus-runtime", "--debug-gyrus-graph"]);
        assert_eq!(
            targets.directives("WARN"),
            "gyrus-graph=debug,gyrus-runtime=debug,warn"
        );
        assert_eq!(DebugTargets::default().directives("info"), "info");
    }
}
