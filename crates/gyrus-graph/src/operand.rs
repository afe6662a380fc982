// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operands accepted by dispatched operations and vectorized builders

use ndarray::{ArrayD, IxDyn};

use crate::error::{GraphError, GraphResult};
use crate::fold::{broadcast_all, Fold};
use crate::node::Node;

/// Argument of a dispatched operation: graph-typed or numeric
#[derive(Debug, Clone)]
pub enum Operand {
    Fold(Fold),
    Node(Node),
    Scalar(f64),
    Array(ArrayD<f64>),
}

impl Operand {
    /// Array shape; nodes and scalars are rank 0
    pub fn shape(&self) -> &[usize] {
        match self {
            Operand::Fold(fold) => fold.shape(),
            Operand::Array(array) => array.shape(),
            Operand::Node(_) | Operand::Scalar(_) => &[],
        }
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, Operand::Fold(_) | Operand::Node(_))
    }

    /// Graph operand as a Fold (a node becomes rank 0)
    pub fn into_fold(self) -> GraphResult<Fold> {
        match self {
            Operand::Fold(fold) => Ok(fold),
            Operand::Node(node) => Ok(Fold::from_node(node)),
            other => Err(GraphError::invalid(format!(
                "expected a graph result, got numeric {:?}",
                other.shape()
            ))),
        }
    }

    /// Graph operand as a single node (a Fold must be rank 0)
    pub fn into_node(self) -> GraphResult<Node> {
        match self {
            Operand::Node(node) => Ok(node),
            Operand::Fold(fold) => fold.as_node().cloned().ok_or_else(|| {
                GraphError::invalid(format!("expected a single node, got Fold {:?}", fold.shape()))
            }),
            other => Err(GraphError::invalid(format!(
                "expected a graph result, got numeric {:?}",
                other.shape()
            ))),
        }
    }

    /// Numeric operand as an array (a scalar becomes rank 0)
    pub fn as_numeric(&self) -> Option<ArrayD<f64>> {
        match self {
            Operand::Scalar(v) => Some(ArrayD::from_elem(IxDyn(&[]), *v)),
            Operand::Array(array) => Some(array.clone()),
            _ => None,
        }
    }
}

impl From<Fold> for Operand {
    fn from(fold: Fold) -> Self {
        Operand::Fold(fold)
    }
}

impl From<&Fold> for Operand {
    fn from(fold: &Fold) -> Self {
        Operand::Fold(fold.clone())
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        Operand::Node(node)
    }
}

impl From<&Node> for Operand {
    fn from(node: &Node) -> Self {
        Operand::Node(node.clone())
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<ArrayD<f64>> for Operand {
    fn from(array: ArrayD<f64>) -> Self {
        Operand::Array(array)
    }
}

/// One broadcast position of an operand
#[derive(Debug, Clone)]
pub enum Element {
    Node(Node),
    Scalar(f64),
}

impl Element {
    pub fn node(&self) -> Option<&Node> {
        match self {
            Element::Node(node) => Some(node),
            Element::Scalar(_) => None,
        }
    }
}

fn elements(operand: &Operand) -> ArrayD<Element> {
    match operand {
        Operand::Fold(fold) => fold.nodes().map(|n| Element::Node(n.clone())),
        Operand::Node(node) => ArrayD::from_elem(IxDyn(&[]), Element::Node(node.clone())),
        Operand::Scalar(v) => ArrayD::from_elem(IxDyn(&[]), Element::Scalar(*v)),
        Operand::Array(array) => array.map(|v| Element::Scalar(*v)),
    }
}

/// Broadcast `operands` and build one node per output position
///
/// The result is a single node when no operand has array structure, and a
/// Fold of the broadcast shape otherwise.
pub fn broadcast_map<F>(operands: &[Operand], mut build: F) -> GraphResult<Operand>
where
    F: FnMut(&[Element]) -> GraphResult<Node>,
{
    let shape = broadcast_all(operands.iter().map(Operand::shape))?;
    let has_fold = operands.iter().any(|o| matches!(o, Operand::Fold(_)));

    let arrays: Vec<ArrayD<Element>> = operands.iter().map(elements).collect();
    let mut columns: Vec<Vec<Element>> = Vec::with_capacity(arrays.len());
    for array in &arrays {
        let view = array.broadcast(IxDyn(&shape)).ok_or_else(|| {
            GraphError::invalid(format!("cannot broadcast {:?} to {:?}", array.shape(), shape))
        })?;
        columns.push(view.iter().cloned().collect());
    }

    let count: usize = shape.iter().product();
    let mut nodes = Vec::with_capacity(count);
    let mut position = Vec::with_capacity(columns.len());
    for i in 0..count {
        position.clear();
        position.extend(columns.iter().map(|c| c[i].clone()));
        nodes.push(build(&position)?);
    }

    if shape.is_empty() && !has_fold {
        let node = nodes
            .pop()
            .ok_or_else(|| GraphError::invalid("broadcast produced no node"))?;
        Ok(Operand::Node(node))
    } else {
        Ok(Operand::Fold(Fold::from_shape_vec(&shape, nodes)?))
    }
}
