// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # gyrus Graph
//!
//! Lazy operator graphs with array semantics. Construction records nodes
//! without touching a simulator; materialization lowers them onto any
//! [`gyrus_runtime::Target`].
//!
//! ## Architecture
//! - [`Node`] / [`Fold`]: immutable shared nodes and numpy-shaped arrays of them
//! - [`ops`]: construction operations, as free functions and methods
//! - [`dispatch`]: append-only handler chains per operation name
//! - [`vectorize()`]: broadcast a single-element lowering over Folds
//! - [`config`]: overlays, explicit values and defaults resolved per node
//! - [`BuildContext`]: memoized materialization onto a target
//! - [`run`]: make, probe, simulate and reshape in one call
//!
//! ## Usage
//!
//! ```rust
//! use gyrus_graph::prelude::*;
//! use ndarray::{arr1, array};
//!
//! let x = ops::stimuli(&arr1(&[1.0, -1.0]).into_dyn()).unwrap();
//! let y = x.transform(&array![[2.0]]).unwrap();
//!
//! let options = RunOptions::default().with_duration(1.0).with_dt(1.0);
//! let out = run(&y, &options).unwrap();
//! assert_eq!(out.shape(), &[2, 1, 1]);
//! assert_eq!(out[[1, 0, 0]], -2.0);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod fold;
pub mod materialize;
pub mod node;
pub mod operand;
pub mod ops;
pub mod vectorize;

pub use config::{ConfigDefaults, Params, ResolvedConfig};
pub use dispatch::{
    dispatch, register, register_handler, DispatchKind, DispatchRegistry, Dispatched, Handler,
};
pub use driver::{probe, run, run_node, run_with, Capture, RunOptions, TimeAxis};
pub use error::{
    ConfigurationError, DispatchError, GraphError, GraphResult, MakeError, MakeResult,
    MaterializationError, RunError, RunResult, ShapeError,
};
pub use fold::{broadcast_all, broadcast_shapes, Fold};
pub use gyrus_config::ConfigValue;
pub use materialize::BuildContext;
pub use node::{Node, NodeId};
pub use operand::{broadcast_map, Element, Operand};
pub use vectorize::{vectorize, ElementBuilder, Vectorized};

/// Common imports for building and running graphs
pub mod prelude {
    pub use crate::ops;
    pub use crate::{
        run, BuildContext, ConfigValue, DispatchKind, Dispatched, ElementBuilder, Fold,
        GraphResult, Node, Operand, Params, RunOptions, TimeAxis,
    };
    pub use gyrus_runtime::{BackendType, Network, Signal, Target};
}
