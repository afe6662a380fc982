// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # gyrus Runtime
//!
//! Reference simulation runtime that graphs are materialized into.
//!
//! ## Architecture
//! - [`Target`]: object-creation interface (sources, linear maps, nonlinear
//!   approximations, feedback accumulators, filters, slices, probes)
//! - [`Network`]: in-process `Target` recording objects in creation order
//! - [`SimulationBackend`]: compiles a `Network` and steps it
//!   - [`CpuBackend`]: sequential reference implementation
//!   - [`BatchedBackend`]: dependency levels evaluated in parallel with rayon
//!
//! ## Usage
//!
//! ```rust
//! use gyrus_runtime::{create_backend, BackendType, Network, Signal, Target};
//! use ndarray::array;
//!
//! let mut net = Network::new();
//! let a = net.create_source(Signal::scalar(1.0)).unwrap();
//! let b = net.create_linear(&[a], vec![array![[2.0]]]).unwrap();
//! let probe = net.attach_probe(b).unwrap();
//!
//! let data = create_backend(BackendType::Cpu).simulate(&net, 1.0, 1.0).unwrap();
//! assert_eq!(data.trace(probe).unwrap()[[0, 0]], 2.0);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod ensemble;
pub mod error;
pub mod network;
pub mod signal;
pub mod target;

pub use backend::{
    create_backend, BackendType, BatchedBackend, CpuBackend, SimulationBackend, SimulationData,
    Simulator,
};
pub use ensemble::{lif_rate, LifEnsemble};
pub use error::{RuntimeError, RuntimeResult};
pub use network::{Network, ObjectRecord, RuntimeObject};
pub use signal::{Signal, TimeFn, VectorFn};
pub use target::{Handle, NeuronType, NonlinearParams, ProbeId, Target};
