// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # gyrus
//!
//! Lazy operator graphs with numpy-style array semantics, lowered onto
//! neural simulation runtimes.
//!
//! Graphs are built by composing [`graph::Fold`]s and [`graph::Node`]s with
//! the operations in [`graph::ops`]. Nothing is simulated until a graph is
//! materialized into a runtime [`runtime::Target`] or handed to
//! [`graph::run`].
//!
//! ## Crates
//! - [`config`]: `gyrus_configuration.toml` loading with env/CLI overrides
//! - [`runtime`]: target interface, `Network`, CPU and batched backends
//! - [`graph`]: construction, dispatch, configuration resolution, make, run
//! - [`observability`] (feature `observability`): logging initialization
//!
//! ## Quick Start
//!
//! ```rust
//! use gyrus::prelude::*;
//! use ndarray::{arr1, array};
//!
//! let x = ops::stimuli(&arr1(&[1.0, -1.0]).into_dyn())?;
//! let y = x.transform(&array![[2.0]])?;
//!
//! let out = run(&y, &RunOptions::default().with_duration(1.0).with_dt(1.0))?;
//! assert_eq!(out.shape(), &[2, 1, 1]);
//! assert_eq!(out[[0, 0, 0]], 2.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use gyrus::prelude::*;
//!
//! let config = gyrus::config::load_config_or_default(None)?;
//! ConfigDefaults::set_global(ConfigDefaults::from_config(&config.defaults));
//! let options = RunOptions::from_config(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use gyrus_config as config;
pub use gyrus_graph as graph;
pub use gyrus_runtime as runtime;

#[cfg(feature = "observability")]
pub use gyrus_observability as observability;

/// Everything needed to build, configure and run graphs
pub mod prelude {
    pub use gyrus_config::GyrusConfig;
    pub use gyrus_graph::prelude::*;
    pub use gyrus_graph::{
        run_node, run_with, vectorize, ConfigDefaults, GraphError, MakeError, RunError,
        ResolvedConfig, Vectorized,
    };
    pub use gyrus_runtime::{create_backend, Handle, SimulationBackend};
}
