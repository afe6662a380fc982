// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Default dispatch handlers for graph operands

use gyrus_runtime::VectorFn;
use ndarray::{Array1, Array2, ArrayView1, Axis, Ix1, Ix2};
use std::sync::Arc;

use super::{
    affine_node, bundle_nodes, decode_node, filter_node, negative_node, product_node,
    scale_node, slice_node, transform_node,
};
use crate::config::Params;
use crate::dispatch::{unary_function, DispatchKind, DispatchRegistry, Dispatched};
use crate::error::{GraphError, GraphResult, ShapeError};
use crate::fold::{check_axis, Fold};
use crate::node::Node;
use crate::operand::{broadcast_map, Element, Operand};

const BINARY_UFUNCS: [&str; 5] = ["add", "subtract", "multiply", "divide", "power"];
const UNARY_UFUNCS: [&str; 9] = [
    "negative", "sin", "cos", "tanh", "exp", "abs", "square", "sqrt", "relu",
];

/// Register the builtin graph implementations in `registry`
pub fn install_builtins(registry: &mut DispatchRegistry) {
    for name in BINARY_UFUNCS {
        registry.register(DispatchKind::Ufunc, name, move |operands, _| {
            binary_ufunc(name, operands)
        });
    }
    for name in UNARY_UFUNCS {
        registry.register(DispatchKind::Ufunc, name, move |operands, _| {
            unary_ufunc(name, operands)
        });
    }

    registry.register(DispatchKind::Function, "sum", |operands, params| {
        reduce("sum", operands, params, Reduction::Sum)
    });
    registry.register(DispatchKind::Function, "mean", |operands, params| {
        reduce("mean", operands, params, Reduction::Mean)
    });
    registry.register(DispatchKind::Function, "dot", dot);
    registry.register(DispatchKind::Function, "concatenate", concatenate);
    registry.register(DispatchKind::Function, "stack", stack);

    registry.register(DispatchKind::Method, "transform", transform);
    registry.register(DispatchKind::Method, "bundle", bundle);
    registry.register(DispatchKind::Method, "unbundle", unbundle);
    registry.register(DispatchKind::Method, "filter", filter);
}

fn handled(result: GraphResult<Operand>) -> GraphResult<Dispatched> {
    result.map(Dispatched::Handled)
}

fn binary_ufunc(name: &'static str, operands: &[Operand]) -> GraphResult<Dispatched> {
    let [_, rhs] = operands else {
        return Err(GraphError::bad_arguments(name, "expects two operands"));
    };
    // Only numeric divisors and exponents have a graph implementation
    if matches!(name, "divide" | "power") && rhs.is_graph() {
        return Ok(Dispatched::Declined);
    }

    handled(broadcast_map(operands, |elems| {
        use Element::{Node as N, Scalar as S};
        match (name, &elems[0], &elems[1]) {
            ("add", N(a), N(b)) => affine_node(name, &[(a, 1.0), (b, 1.0)], 0.0),
            ("add", N(a), S(c)) | ("add", S(c), N(a)) => affine_node(name, &[(a, 1.0)], *c),
            ("subtract", N(a), N(b)) => affine_node(name, &[(a, 1.0), (b, -1.0)], 0.0),
            ("subtract", N(a), S(c)) => affine_node(name, &[(a, 1.0)], -*c),
            ("subtract", S(c), N(a)) => affine_node(name, &[(a, -1.0)], *c),
            ("multiply", N(a), N(b)) => product_node(a, b),
            ("multiply", N(a), S(c)) | ("multiply", S(c), N(a)) => scale_node(a, *c),
            ("divide", N(a), S(c)) => {
                if *c == 0.0 {
                    Err(GraphError::bad_arguments(name, "division by zero"))
                } else {
                    scale_node(a, 1.0 / *c)
                }
            }
            ("power", N(a), S(p)) => {
                let p = *p;
                let function: VectorFn =
                    Arc::new(move |x: &[f64]| x.iter().map(|v| v.powf(p)).collect());
                decode_node(a, function, None, Params::new())
            }
            _ => Err(GraphError::bad_arguments(
                name,
                "no graph operand at this position",
            )),
        }
    }))
}

fn unary_ufunc(name: &'static str, operands: &[Operand]) -> GraphResult<Dispatched> {
    let f = unary_function(name)
        .ok_or_else(|| GraphError::bad_arguments(name, "not a unary operation"))?;
    if operands.len() != 1 {
        return Err(GraphError::bad_arguments(name, "expects one operand"));
    }
    let function: VectorFn = Arc::new(move |x: &[f64]| x.iter().map(|&v| f(v)).collect());
    handled(broadcast_map(operands, |elems| match &elems[0] {
        Element::Node(node) if name == "negative" => negative_node(node),
        Element::Node(node) => decode_node(node, function.clone(), None, Params::new()),
        Element::Scalar(_) => Err(GraphError::bad_arguments(name, "expected a graph operand")),
    }))
}

enum Reduction {
    Sum,
    Mean,
    Weighted(Array1<f64>),
}

impl Reduction {
    fn reduce(&self, op: &str, lane: ArrayView1<Node>) -> GraphResult<Node> {
        if lane.is_empty() {
            return Err(GraphError::bad_arguments(op, "cannot reduce an empty axis"));
        }
        let n = lane.len() as f64;
        let terms: Vec<(&Node, f64)> = match self {
            Reduction::Sum => lane.iter().map(|node| (node, 1.0)).collect(),
            Reduction::Mean => lane.iter().map(|node| (node, 1.0 / n)).collect(),
            Reduction::Weighted(weights) => {
                if weights.len() != lane.len() {
                    return Err(GraphError::size_mismatch(op, lane.len(), weights.len()));
                }
                lane.iter().zip(weights.iter()).map(|(node, &w)| (node, w)).collect()
            }
        };
        affine_node(op, &terms, 0.0)
    }
}

fn normalize_axis(axis: i64, ndim: usize) -> Result<usize, ShapeError> {
    let resolved = if axis < 0 { axis + ndim as i64 } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(ShapeError::AxisOutOfBounds {
            axis: axis.unsigned_abs() as usize,
            ndim,
        });
    }
    Ok(resolved as usize)
}

fn reduce_fold(
    op: &str,
    fold: &Fold,
    axis: Option<usize>,
    reduction: &Reduction,
) -> GraphResult<Operand> {
    match axis {
        None => {
            let all: Vec<Node> = fold.iter().cloned().collect();
            let node = reduction.reduce(op, ArrayView1::from(&all[..]))?;
            Ok(Operand::Node(node))
        }
        Some(axis) => {
            let mut shape = fold.shape().to_vec();
            shape.remove(axis);
            let nodes = fold
                .nodes()
                .lanes(Axis(axis))
                .into_iter()
                .map(|lane| reduction.reduce(op, lane))
                .collect::<GraphResult<Vec<_>>>()?;
            Ok(Operand::Fold(Fold::from_shape_vec(&shape, nodes)?))
        }
    }
}

fn reduce(
    op: &str,
    operands: &[Operand],
    params: &Params,
    reduction: Reduction,
) -> GraphResult<Dispatched> {
    let [x] = operands else {
        return Err(GraphError::bad_arguments(op, "expects one operand"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    let fold = x.clone().into_fold()?;
    let axis = match params.get("axis") {
        None => None,
        Some(_) => Some(normalize_axis(params.int_or(op, "axis", 0)?, fold.ndim())?),
    };
    handled(reduce_fold(op, &fold, axis, &reduction))
}

fn dot(operands: &[Operand], _params: &Params) -> GraphResult<Dispatched> {
    let [x, weights] = operands else {
        return Err(GraphError::bad_arguments("dot", "expects an operand and weights"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    let weights = weights
        .as_numeric()
        .and_then(|w| w.into_dimensionality::<Ix1>().ok())
        .ok_or_else(|| GraphError::bad_arguments("dot", "weights must be a 1-D numeric array"))?;
    let fold = x.clone().into_fold()?;
    if fold.ndim() == 0 {
        return Err(GraphError::bad_arguments("dot", "operand has no axis to contract"));
    }
    let axis = fold.ndim() - 1;
    handled(reduce_fold("dot", &fold, Some(axis), &Reduction::Weighted(weights)))
}

fn graph_folds(op: &str, operands: &[Operand]) -> GraphResult<Option<Vec<Fold>>> {
    if operands.is_empty() {
        return Err(GraphError::bad_arguments(op, "expects at least one operand"));
    }
    if !operands.iter().all(Operand::is_graph) {
        return Ok(None);
    }
    operands
        .iter()
        .map(|o| o.clone().into_fold())
        .collect::<GraphResult<Vec<_>>>()
        .map(Some)
}

fn concatenate(operands: &[Operand], params: &Params) -> GraphResult<Dispatched> {
    let Some(folds) = graph_folds("concatenate", operands)? else {
        return Ok(Dispatched::Declined);
    };
    let axis = params.int_or("concatenate", "axis", 0)?;
    let axis = normalize_axis(axis, folds[0].ndim())?;
    handled(Fold::concatenate(&folds, axis).map(Operand::Fold))
}

fn stack(operands: &[Operand], params: &Params) -> GraphResult<Dispatched> {
    let Some(folds) = graph_folds("stack", operands)? else {
        return Ok(Dispatched::Declined);
    };
    let axis = params.int_or("stack", "axis", 0)?;
    let axis = normalize_axis(axis, folds[0].ndim() + 1)?;
    if axis == 0 {
        return handled(Fold::stack(&folds).map(Operand::Fold));
    }
    let expanded = folds
        .iter()
        .map(|f| f.insert_axis(axis))
        .collect::<GraphResult<Vec<_>>>()?;
    handled(Fold::concatenate(&expanded, axis).map(Operand::Fold))
}

fn transform(operands: &[Operand], _params: &Params) -> GraphResult<Dispatched> {
    let [x, matrix] = operands else {
        return Err(GraphError::bad_arguments("transform", "expects an operand and a matrix"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    if let Operand::Scalar(c) = matrix {
        return handled(super::map_graph("transform", x.clone(), |node| scale_node(node, *c)));
    }
    let matrix: Array2<f64> = matrix
        .as_numeric()
        .and_then(|m| m.into_dimensionality::<Ix2>().ok())
        .ok_or_else(|| GraphError::bad_arguments("transform", "matrix must be 2-D"))?;
    handled(super::map_graph("transform", x.clone(), |node| {
        transform_node(node, &matrix)
    }))
}

fn bundle(operands: &[Operand], params: &Params) -> GraphResult<Dispatched> {
    let [x] = operands else {
        return Err(GraphError::bad_arguments("bundle", "expects one operand"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    let fold = x.clone().into_fold()?;
    let axis = normalize_axis(params.int_or("bundle", "axis", 0)?, fold.ndim())?;
    let mut shape = fold.shape().to_vec();
    shape.remove(axis);
    let nodes = fold
        .nodes()
        .lanes(Axis(axis))
        .into_iter()
        .map(|lane| bundle_nodes(&lane.to_vec()))
        .collect::<GraphResult<Vec<_>>>()?;
    handled(Fold::from_shape_vec(&shape, nodes).map(Operand::Fold))
}

fn unbundle(operands: &[Operand], params: &Params) -> GraphResult<Dispatched> {
    let [x] = operands else {
        return Err(GraphError::bad_arguments("unbundle", "expects one operand"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    let fold = x.clone().into_fold()?;
    let ndim = fold.ndim();
    let axis = params.int_or("unbundle", "axis", 0)?;
    let axis = normalize_axis(axis, ndim + 1)?;

    let size = fold.iter().next().map_or(0, Node::size_out);
    if let Some(other) = fold.iter().find(|n| n.size_out() != size) {
        return Err(ShapeError::Invalid(format!(
            "cannot unbundle nodes of sizes {} and {}",
            size,
            other.size_out()
        ))
        .into());
    }

    let mut nodes = Vec::with_capacity(fold.len() * size);
    for node in fold.iter() {
        for k in 0..size {
            nodes.push(slice_node(node, &[k])?);
        }
    }
    let mut shape = fold.shape().to_vec();
    shape.push(size);
    let trailing = Fold::from_shape_vec(&shape, nodes)?;

    // move the new trailing axis into place
    let mut axes: Vec<usize> = (0..ndim).collect();
    axes.insert(axis, ndim);
    handled(trailing.permute_axes(&axes).map(Operand::Fold))
}

fn filter(operands: &[Operand], params: &Params) -> GraphResult<Dispatched> {
    let [x] = operands else {
        return Err(GraphError::bad_arguments("filter", "expects one operand"));
    };
    if !x.is_graph() {
        return Ok(Dispatched::Declined);
    }
    let tau = match params.get("tau") {
        None => None,
        Some(value) => Some(value.as_f64().ok_or_else(|| {
            GraphError::bad_arguments(
                "filter",
                format!("'tau' must be a float, got {}", value.type_name()),
            )
        })?),
    };
    handled(super::map_graph("filter", x.clone(), |node| filter_node(node, tau)))
}
