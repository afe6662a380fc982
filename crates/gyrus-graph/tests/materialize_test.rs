// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Integration Tests: Materialization
//!
//! - Shared nodes are realized exactly once per build context
//! - Equal constructions realize to equal object sequences
//! - Configuration precedence across overlays
//! - Independent contexts on separate threads

use gyrus_graph::prelude::*;
use gyrus_graph::{ConfigurationError, MakeError};
use gyrus_runtime::{
    Handle, NonlinearParams, ProbeId, RuntimeObject, RuntimeResult, TimeFn, VectorFn,
};
use ndarray::{arr1, Array2};
use std::sync::Arc;
use std::thread;

// ═══════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════

/// Network wrapper counting object creation calls
#[derive(Default)]
struct CountingTarget {
    inner: Network,
    creates: usize,
    nonlinear_params: Vec<NonlinearParams>,
}

impl Target for CountingTarget {
    fn create_source(&mut self, signal: Signal) -> RuntimeResult<Handle> {
        self.creates += 1;
        self.inner.create_source(signal)
    }

    fn create_linear(
        &mut self,
        inputs: &[Handle],
        coefficients: Vec<Array2<f64>>,
    ) -> RuntimeResult<Handle> {
        self.creates += 1;
        self.inner.create_linear(inputs, coefficients)
    }

    fn create_nonlinear(
        &mut self,
        input: Handle,
        function: VectorFn,
        size_out: usize,
        params: NonlinearParams,
    ) -> RuntimeResult<Handle> {
        self.creates += 1;
        self.nonlinear_params.push(params);
        self.inner.create_nonlinear(input, function, size_out, params)
    }

    fn create_feedback(&mut self, input: Handle) -> RuntimeResult<Handle> {
        self.creates += 1;
        self.inner.create_feedback(input)
    }

    fn connect_feedback(&mut self, feedback: Handle, integrand: Handle) -> RuntimeResult<()> {
        self.inner.connect_feedback(feedback, integrand)
    }

    fn create_filter(&mut self, input: Handle, tau: f64) -> RuntimeResult<Handle> {
        self.creates += 1;
        self.inner.create_filter(input, tau)
    }

    fn attach_probe(&mut self, handle: Handle) -> RuntimeResult<ProbeId> {
        self.inner.attach_probe(handle)
    }
}

fn identity() -> impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static {
    |x: &[f64]| x.to_vec()
}

fn kinds(net: &Network) -> Vec<&'static str> {
    net.objects().iter().map(|r| r.object.kind()).collect()
}

// ═══════════════════════════════════════════════════════════
// Sharing
// ═══════════════════════════════════════════════════════════

#[test]
fn test_diamond_realizes_shared_node_once() {
    let a = ops::stimulus(vec![1.0, 2.0]).unwrap();
    let left = a.transform(&Array2::eye(2)).unwrap();
    let right = a.negative().unwrap();
    let joined = ops::add(&left, &right).unwrap().into_node().unwrap();

    let mut target = CountingTarget::default();
    let mut ctx = BuildContext::new(&mut target);
    let first = ctx.make(&joined).unwrap();
    let again = ctx.make(&joined).unwrap();
    let shared = ctx.built(&a).unwrap();
    drop(ctx);

    assert_eq!(first, again);
    assert_eq!(target.creates, 4);
    assert_eq!(shared, Handle::new(0, 2));
}

#[test]
fn test_slice_without_partial_connections_uses_selection_matrix() {
    let a = ops::stimulus(vec![1.0, 2.0, 3.0]).unwrap();
    let s = a.slice_outputs(&[2, 0]).unwrap();

    let mut counting = CountingTarget::default();
    BuildContext::new(&mut counting).make(&s).unwrap();
    assert_eq!(kinds(&counting.inner), vec!["source", "linear"]);

    let mut net = Network::new();
    BuildContext::new(&mut net).make(&s).unwrap();
    assert_eq!(kinds(&net), vec!["source", "slice"]);
}

// ═══════════════════════════════════════════════════════════
// Purity
// ═══════════════════════════════════════════════════════════

fn build_pipeline() -> Fold {
    let x = ops::stimuli(&arr1(&[0.5, -0.5, 0.25]).into_dyn()).unwrap();
    let y = x.decode(identity(), None).unwrap();
    let z = y.multiply(2.0).unwrap().filter(Some(0.01)).unwrap();
    z.configure(Params::new().with("n_neurons", 20)).unwrap()
}

#[test]
fn test_equal_constructions_realize_identically() {
    let first = build_pipeline();
    let second = build_pipeline();
    assert!(first
        .iter()
        .zip(second.iter())
        .all(|(a, b)| !a.ptr_eq(b) && a.op_kind() == b.op_kind()));

    let mut net_a = Network::new();
    let mut net_b = Network::new();
    BuildContext::new(&mut net_a).make_fold(&first).unwrap();
    BuildContext::new(&mut net_b).make_fold(&second).unwrap();
    assert_eq!(kinds(&net_a), kinds(&net_b));
}

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

#[test]
fn test_left_input_overlay_wins_at_equal_distance() {
    let a = ops::stimulus(vec![0.1]).unwrap();
    let b = ops::stimulus(vec![0.2]).unwrap();
    let a = a.configure(Params::new().with("n_neurons", 1));
    let b = b.configure(Params::new().with("n_neurons", 2));
    let joined = ops::bundle_nodes(&[a, b]).unwrap();
    let decoded = joined.decode(identity(), None).unwrap();

    let mut target = CountingTarget::default();
    BuildContext::new(&mut target).make(&decoded).unwrap();
    assert_eq!(target.nonlinear_params[0].n_neurons, 1);
}

#[test]
fn test_nearer_overlay_and_explicit_values_win() {
    let x = ops::stimulus(vec![0.1]).unwrap();
    let far = x.configure(Params::new().with("n_neurons", 7).with("radius", 3.0));
    let mid = far.transform(&Array2::eye(1)).unwrap();
    let near = mid.configure(Params::new().with("n_neurons", 9));
    let decoded = ops::decode_with(&near, identity(), None, Params::new().with("seed", 42))
        .unwrap()
        .into_node()
        .unwrap();

    let mut target = CountingTarget::default();
    BuildContext::new(&mut target).make(&decoded).unwrap();
    let params = target.nonlinear_params[0];
    assert_eq!(params.n_neurons, 9);
    assert_eq!(params.radius, 3.0);
    assert_eq!(params.seed, 42);
}

#[test]
fn test_explicit_unknown_parameter_rejected() {
    let x = ops::stimulus(vec![0.1]).unwrap();
    let decoded = ops::decode_with(&x, identity(), None, Params::new().with("synapse", 0.1))
        .unwrap()
        .into_node()
        .unwrap();
    let err = BuildContext::new(&mut Network::new()).make(&decoded).unwrap_err();
    match err {
        MakeError::Configuration(ConfigurationError::UnknownParameter { key, .. }) => {
            assert_eq!(key, "synapse")
        }
        other => panic!("expected unknown parameter, got {:?}", other),
    }
}

#[test]
fn test_ill_typed_value_rejected() {
    let x = ops::stimulus(vec![0.1]).unwrap();
    let x = x.configure(Params::new().with("n_neurons", "many"));
    let decoded = x.decode(identity(), None).unwrap();
    let err = BuildContext::new(&mut Network::new()).make(&decoded).unwrap_err();
    assert!(matches!(
        err,
        MakeError::Configuration(ConfigurationError::InvalidValue { .. })
    ));
}

// ═══════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════

#[test]
fn test_independent_contexts_on_two_threads() {
    let graph = Arc::new(build_pipeline());
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                let mut net = Network::new();
                BuildContext::new(&mut net).make_fold(&graph).unwrap();
                kinds(&net)
            })
        })
        .collect();
    let results: Vec<Vec<&'static str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], results[1]);
    assert!(!results[0].is_empty());
}

#[test]
fn test_time_function_sources() {
    let f: TimeFn = Arc::new(|t| vec![t, 2.0 * t]);
    let node = ops::stimulus(Signal::Function { size: 2, function: f }).unwrap();
    let mut net = Network::new();
    let handle = BuildContext::new(&mut net).make(&node).unwrap();
    assert_eq!(handle.size(), 2);
    assert!(matches!(net.object(handle).unwrap(), RuntimeObject::Source(_)));
}
