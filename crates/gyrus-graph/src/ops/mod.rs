// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Construction Operations
//!
//! Free functions that build graphs. Elementwise operations, reductions and
//! the structural methods route through the dispatch registry, so user
//! handlers can intercept them; operations taking closures (`decode`,
//! `integrate`) and the configuration wrapper construct nodes directly.
//!
//! The `*_node` functions build a single node and are what the builtin
//! handlers use per broadcast position.
//!
//! Every operation allocates new nodes and inspects no numeric values, so
//! equal calls build equal but distinct graphs.

mod arith;
mod builtins;
pub(crate) mod elements;
mod methods;

pub use builtins::install_builtins;

use gyrus_runtime::{Signal, VectorFn};
use ndarray::{Array1, Array2, ArrayD};
use std::sync::Arc;

use crate::config::Params;
use crate::dispatch::{dispatch, DispatchKind};
use crate::error::{GraphError, GraphResult};
use crate::fold::Fold;
use crate::node::Node;
use crate::operand::Operand;
use elements::{
    BundleElement, ConfigureElement, DecodeElement, FilterElement, SliceElement,
    StimulusElement, TransformElement,
};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Leaf producing a constant vector or a time function
pub fn stimulus(signal: impl Into<Signal>) -> GraphResult<Node> {
    let element = StimulusElement {
        signal: signal.into(),
    };
    Node::from_element(Arc::new(element), Vec::new(), Params::new())
}

/// Leaf producing `function(t)`, which must return `size` values
pub fn stimulus_fn<F>(size: usize, function: F) -> GraphResult<Node>
where
    F: Fn(f64) -> Vec<f64> + Send + Sync + 'static,
{
    stimulus(Signal::function(size, function))
}

/// One size-1 constant leaf per array element, shaped like `values`
pub fn stimuli(values: &ArrayD<f64>) -> GraphResult<Fold> {
    let nodes = values
        .iter()
        .map(|&v| stimulus(vec![v]))
        .collect::<GraphResult<Vec<_>>>()?;
    Fold::from_shape_vec(values.shape(), nodes)
}

/// One leaf per signal, shaped like `signals`
pub fn stimuli_signals(signals: &ArrayD<Signal>) -> GraphResult<Fold> {
    let nodes = signals
        .iter()
        .map(|s| stimulus(s.clone()))
        .collect::<GraphResult<Vec<_>>>()?;
    Fold::from_shape_vec(signals.shape(), nodes)
}

// ---------------------------------------------------------------------------
// Single-node construction
// ---------------------------------------------------------------------------

/// `Σ matrices[i] · inputs[i]`
pub fn linear_node(inputs: Vec<Node>, matrices: Vec<Array2<f64>>) -> GraphResult<Node> {
    Node::from_element(
        Arc::new(TransformElement { matrices }),
        inputs,
        Params::new(),
    )
}

/// `matrix · node`
pub fn transform_node(node: &Node, matrix: &Array2<f64>) -> GraphResult<Node> {
    linear_node(vec![node.clone()], vec![matrix.clone()])
}

fn coefficient_block(size_out: usize, size_in: usize, coefficient: f64) -> Array2<f64> {
    if size_in == size_out {
        Array2::eye(size_out) * coefficient
    } else {
        Array2::from_elem((size_out, 1), coefficient)
    }
}

/// `Σ coefficient · node + constant`, broadcasting size-1 outputs
pub(crate) fn affine_node(op: &str, terms: &[(&Node, f64)], constant: f64) -> GraphResult<Node> {
    let size = terms.iter().map(|(n, _)| n.size_out()).max().unwrap_or(1);
    let mut inputs = Vec::with_capacity(terms.len() + 1);
    let mut matrices = Vec::with_capacity(terms.len() + 1);
    for (node, coefficient) in terms {
        let s = node.size_out();
        if s != size && s != 1 {
            return Err(GraphError::size_mismatch(op, size, s));
        }
        inputs.push((*node).clone());
        matrices.push(coefficient_block(size, s, *coefficient));
    }
    if constant != 0.0 {
        inputs.push(stimulus(vec![constant])?);
        matrices.push(Array2::ones((size, 1)));
    }
    linear_node(inputs, matrices)
}

/// `coefficient · node`
pub fn scale_node(node: &Node, coefficient: f64) -> GraphResult<Node> {
    affine_node("multiply", &[(node, coefficient)], 0.0)
}

pub fn negative_node(node: &Node) -> GraphResult<Node> {
    affine_node("negative", &[(node, -1.0)], 0.0)
}

/// Nonlinear approximation of `function` applied to `node`
///
/// Without an explicit `size_out`, `function` is called once on a zero vector
/// to check that it preserves the input size. A function that must not be
/// evaluated at zero should be given its output size; the length is then
/// checked by the runtime on first evaluation instead.
pub fn decode_node(
    node: &Node,
    function: VectorFn,
    size_out: Option<usize>,
    params: Params,
) -> GraphResult<Node> {
    let size_out = match size_out {
        Some(size_out) => size_out,
        None => {
            let size_in = node.size_out();
            let produced = function(&vec![0.0; size_in]).len();
            if produced != size_in {
                return Err(GraphError::size_mismatch("decode", size_in, produced));
            }
            size_in
        }
    };
    Node::from_element(
        Arc::new(DecodeElement { function, size_out }),
        vec![node.clone()],
        params,
    )
}

/// Elementwise product of two graph values, approximated jointly
pub fn product_node(a: &Node, b: &Node) -> GraphResult<Node> {
    let (sa, sb) = (a.size_out(), b.size_out());
    if sa != sb && sa != 1 && sb != 1 {
        return Err(GraphError::size_mismatch("multiply", sa, sb));
    }
    let size = sa.max(sb);
    let joined = bundle_nodes(&[a.clone(), b.clone()])?;
    let function: VectorFn = Arc::new(move |x: &[f64]| {
        let (left, right) = x.split_at(sa);
        (0..size)
            .map(|i| left[if sa == 1 { 0 } else { i }] * right[if sb == 1 { 0 } else { i }])
            .collect()
    });
    decode_node(&joined, function, Some(size), Params::new())
}

/// Selection of `indices` from the node's output
pub fn slice_node(node: &Node, indices: &[usize]) -> GraphResult<Node> {
    Node::from_element(
        Arc::new(SliceElement {
            indices: indices.to_vec(),
        }),
        vec![node.clone()],
        Params::new(),
    )
}

/// Node whose output concatenates the outputs of `nodes`
pub fn bundle_nodes(nodes: &[Node]) -> GraphResult<Node> {
    Node::from_element(Arc::new(BundleElement), nodes.to_vec(), Params::new())
}

/// Lowpass filter; `tau = None` resolves the `synapse` parameter
pub fn filter_node(node: &Node, tau: Option<f64>) -> GraphResult<Node> {
    let mut explicit = Params::new();
    if let Some(tau) = tau {
        if !(tau >= 0.0) {
            return Err(GraphError::bad_arguments(
                "filter",
                format!("time constant must be non-negative, got {}", tau),
            ));
        }
        explicit.insert("synapse", tau);
    }
    Node::from_element(Arc::new(FilterElement), vec![node.clone()], explicit)
}

/// Pass-through node applying `overlay` to everything downstream
pub fn configure_node(node: &Node, overlay: Params) -> Node {
    Node::with_overlay(Arc::new(ConfigureElement), node.clone(), overlay)
}

/// Integrator `dx/dt = u + integrand(x)`
///
/// `integrand` is applied immediately to a state placeholder standing for
/// `x`; it must return a node of `u`'s size.
pub fn integrate_node<F>(u: &Node, integrand: Option<F>) -> GraphResult<Node>
where
    F: FnOnce(&Node) -> GraphResult<Node>,
{
    let state = Node::state(u);
    let integrand = match integrand {
        Some(f) => {
            let out = f(&state)?;
            if out.size_out() != u.size_out() {
                return Err(GraphError::size_mismatch(
                    "integrate",
                    u.size_out(),
                    out.size_out(),
                ));
            }
            Some(out)
        }
        None => None,
    };
    Ok(Node::integrator(u.clone(), state, integrand))
}

// ---------------------------------------------------------------------------
// Operand-level API
// ---------------------------------------------------------------------------

/// Apply a single-node construction to every node of a graph operand
pub(crate) fn map_graph<F>(op: &str, x: Operand, mut f: F) -> GraphResult<Operand>
where
    F: FnMut(&Node) -> GraphResult<Node>,
{
    match x {
        Operand::Node(node) => Ok(Operand::Node(f(&node)?)),
        Operand::Fold(fold) => Ok(Operand::Fold(fold.map(f)?)),
        other => Err(GraphError::bad_arguments(
            op,
            format!("expected a graph operand, got numeric {:?}", other.shape()),
        )),
    }
}

/// Dispatch an elementwise operation by name
pub fn ufunc(name: &str, operands: &[Operand]) -> GraphResult<Operand> {
    dispatch(DispatchKind::Ufunc, name, operands, &Params::new())
}

pub fn add(a: impl Into<Operand>, b: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("add", &[a.into(), b.into()])
}

pub fn subtract(a: impl Into<Operand>, b: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("subtract", &[a.into(), b.into()])
}

/// By a scalar this is linear; two graph operands are multiplied by a
/// nonlinear approximation of their joint output
pub fn multiply(a: impl Into<Operand>, b: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("multiply", &[a.into(), b.into()])
}

/// Division by numeric values only
pub fn divide(a: impl Into<Operand>, b: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("divide", &[a.into(), b.into()])
}

pub fn power(x: impl Into<Operand>, exponent: f64) -> GraphResult<Operand> {
    ufunc("power", &[x.into(), exponent.into()])
}

pub fn negative(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("negative", &[x.into()])
}

pub fn sin(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("sin", &[x.into()])
}

pub fn cos(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("cos", &[x.into()])
}

pub fn tanh(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("tanh", &[x.into()])
}

pub fn exp(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("exp", &[x.into()])
}

pub fn abs(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("abs", &[x.into()])
}

pub fn square(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("square", &[x.into()])
}

pub fn sqrt(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("sqrt", &[x.into()])
}

pub fn relu(x: impl Into<Operand>) -> GraphResult<Operand> {
    ufunc("relu", &[x.into()])
}

/// `matrix · x` for every node of `x`
pub fn transform(x: impl Into<Operand>, matrix: &Array2<f64>) -> GraphResult<Operand> {
    dispatch(
        DispatchKind::Method,
        "transform",
        &[x.into(), Operand::Array(matrix.clone().into_dyn())],
        &Params::new(),
    )
}

/// Merge nodes along `axis` into nodes with concatenated outputs
pub fn bundle(x: impl Into<Operand>, axis: usize) -> GraphResult<Operand> {
    dispatch(
        DispatchKind::Method,
        "bundle",
        &[x.into()],
        &Params::new().with("axis", axis),
    )
}

/// Split every node into size-1 nodes placed along a new `axis`
pub fn unbundle(x: impl Into<Operand>, axis: usize) -> GraphResult<Operand> {
    dispatch(
        DispatchKind::Method,
        "unbundle",
        &[x.into()],
        &Params::new().with("axis", axis),
    )
}

/// Lowpass filter every node; `None` resolves the `synapse` parameter
pub fn filter(x: impl Into<Operand>, tau: Option<f64>) -> GraphResult<Operand> {
    let mut params = Params::new();
    if let Some(tau) = tau {
        params.insert("tau", tau);
    }
    dispatch(DispatchKind::Method, "filter", &[x.into()], &params)
}

fn axis_params(axis: Option<isize>) -> Params {
    let mut params = Params::new();
    if let Some(axis) = axis {
        params.insert("axis", axis as i64);
    }
    params
}

/// Sum over `axis` (negative counts from the end), or over all nodes
pub fn sum(x: impl Into<Operand>, axis: Option<isize>) -> GraphResult<Operand> {
    dispatch(DispatchKind::Function, "sum", &[x.into()], &axis_params(axis))
}

/// Mean over `axis`, or over all nodes
pub fn mean(x: impl Into<Operand>, axis: Option<isize>) -> GraphResult<Operand> {
    dispatch(DispatchKind::Function, "mean", &[x.into()], &axis_params(axis))
}

/// Weighted sum over the last axis
pub fn dot(x: impl Into<Operand>, weights: &Array1<f64>) -> GraphResult<Operand> {
    dispatch(
        DispatchKind::Function,
        "dot",
        &[x.into(), Operand::Array(weights.clone().into_dyn())],
        &Params::new(),
    )
}

pub fn concatenate(folds: &[Fold], axis: usize) -> GraphResult<Operand> {
    let operands: Vec<Operand> = folds.iter().map(Operand::from).collect();
    dispatch(
        DispatchKind::Function,
        "concatenate",
        &operands,
        &Params::new().with("axis", axis),
    )
}

/// Join equally shaped Folds along a new `axis`
pub fn stack(folds: &[Fold], axis: usize) -> GraphResult<Operand> {
    let operands: Vec<Operand> = folds.iter().map(Operand::from).collect();
    dispatch(
        DispatchKind::Function,
        "stack",
        &operands,
        &Params::new().with("axis", axis),
    )
}

/// Approximate `function` on every node of `x`
///
/// The output size defaults to the input size, checked by calling `function`
/// on a zero vector; passing `size_out` skips that call.
pub fn decode<F>(
    x: impl Into<Operand>,
    function: F,
    size_out: Option<usize>,
) -> GraphResult<Operand>
where
    F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
{
    decode_with(x, function, size_out, Params::new())
}

/// [`decode`] with explicit values for its configurable parameters
/// (`n_neurons`, `radius`, `neuron_type`, `seed`)
pub fn decode_with<F>(
    x: impl Into<Operand>,
    function: F,
    size_out: Option<usize>,
    params: Params,
) -> GraphResult<Operand>
where
    F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
{
    let function: VectorFn = Arc::new(function);
    map_graph("decode", x.into(), |node| {
        decode_node(node, function.clone(), size_out, params.clone())
    })
}

/// Select output dimensions of every node
pub fn slice(x: impl Into<Operand>, indices: &[usize]) -> GraphResult<Operand> {
    map_graph("slice", x.into(), |node| slice_node(node, indices))
}

/// Wrap every node in a pass-through node carrying `overlay`
pub fn configure(x: impl Into<Operand>, overlay: Params) -> GraphResult<Operand> {
    map_graph("configure", x.into(), |node| {
        Ok(configure_node(node, overlay.clone()))
    })
}

/// Pure accumulation `dx/dt = u`
pub fn integrate(u: impl Into<Operand>) -> GraphResult<Operand> {
    map_graph("integrate", u.into(), |node| {
        integrate_node(node, None::<fn(&Node) -> GraphResult<Node>>)
    })
}

/// `dx/dt = u + integrand(x)`, applied per node
pub fn integrate_with<F>(u: impl Into<Operand>, integrand: F) -> GraphResult<Operand>
where
    F: Fn(&Node) -> GraphResult<Node>,
{
    map_graph("integrate", u.into(), |node| {
        integrate_node(node, Some(|state: &Node| integrand(state)))
    })
}

/// Linear time-invariant system `dx/dt = A·x + B·u`
pub fn lti(u: impl Into<Operand>, a: &Array2<f64>, b: &Array2<f64>) -> GraphResult<Operand> {
    lti_with(u, a, b, |x| Ok(x.clone()))
}

/// `dx/dt = A·state(x) + B·u`
///
/// `state` maps the accumulator's output before `A` is applied, so `A` must
/// take `state(x)` back to the size of `B·u`.
pub fn lti_with<F>(
    u: impl Into<Operand>,
    a: &Array2<f64>,
    b: &Array2<f64>,
    state: F,
) -> GraphResult<Operand>
where
    F: Fn(&Node) -> GraphResult<Node>,
{
    let driven = transform(u, b)?;
    integrate_with(driven, |x| transform_node(&state(x)?, a))
}
