// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Fold
//!
//! N-dimensional array of [`Node`]s. The array shape is independent of each
//! node's output size: a `(3, 4)` Fold of size-2 nodes describes twelve
//! two-dimensional signals. Reshaping, transposing, indexing and slicing a
//! Fold only rearranges references, so every view shares its nodes with the
//! original.

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::fmt;
use std::ops::Range;

use crate::error::{GraphError, GraphResult, ShapeError};
use crate::node::Node;

/// Numpy broadcast of two shapes
pub fn broadcast_shapes(left: &[usize], right: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let ndim = left.len().max(right.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let l = if i < ndim - left.len() { 1 } else { left[i - (ndim - left.len())] };
        let r = if i < ndim - right.len() { 1 } else { right[i - (ndim - right.len())] };
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => {
                return Err(ShapeError::Broadcast {
                    left: left.to_vec(),
                    right: right.to_vec(),
                })
            }
        };
    }
    Ok(out)
}

/// Numpy broadcast of any number of shapes
pub fn broadcast_all<'a, I>(shapes: I) -> Result<Vec<usize>, ShapeError>
where
    I: IntoIterator<Item = &'a [usize]>,
{
    shapes
        .into_iter()
        .try_fold(Vec::new(), |acc, shape| broadcast_shapes(&acc, shape))
}

pub(crate) fn check_axis(axis: usize, ndim: usize) -> Result<(), ShapeError> {
    if axis < ndim {
        Ok(())
    } else {
        Err(ShapeError::AxisOutOfBounds { axis, ndim })
    }
}

/// Array of nodes with numpy-style shape semantics
#[derive(Clone)]
pub struct Fold {
    nodes: ArrayD<Node>,
}

impl Fold {
    /// Rank-0 Fold holding a single node
    pub fn from_node(node: Node) -> Self {
        Self {
            nodes: ArrayD::from_elem(IxDyn(&[]), node),
        }
    }

    pub fn from_array(nodes: ArrayD<Node>) -> Self {
        Self { nodes }
    }

    /// Fold of `shape` filled from `nodes` in row-major order
    pub fn from_shape_vec(shape: &[usize], nodes: Vec<Node>) -> GraphResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != nodes.len() {
            return Err(ShapeError::Invalid(format!(
                "{} nodes cannot fill shape {:?}",
                nodes.len(),
                shape
            ))
            .into());
        }
        ArrayD::from_shape_vec(IxDyn(shape), nodes)
            .map(Self::from_array)
            .map_err(|e| ShapeError::Invalid(e.to_string()).into())
    }

    /// Stack equally shaped Folds along a new leading axis
    ///
    /// Ragged input (Folds of different shapes) is a `ShapeError`.
    pub fn stack(folds: &[Fold]) -> GraphResult<Self> {
        let first = folds
            .first()
            .ok_or_else(|| GraphError::invalid("cannot stack an empty list of Folds"))?;
        if let Some(ragged) = folds.iter().find(|f| f.shape() != first.shape()) {
            return Err(ShapeError::Invalid(format!(
                "ragged nesting: shapes {:?} and {:?}",
                first.shape(),
                ragged.shape()
            ))
            .into());
        }
        let mut shape = vec![folds.len()];
        shape.extend_from_slice(first.shape());
        let nodes = folds.iter().flat_map(|f| f.iter().cloned()).collect();
        Self::from_shape_vec(&shape, nodes)
    }

    /// Join Folds along an existing axis
    pub fn concatenate(folds: &[Fold], axis: usize) -> GraphResult<Self> {
        let first = folds
            .first()
            .ok_or_else(|| GraphError::invalid("cannot concatenate an empty list of Folds"))?;
        check_axis(axis, first.ndim())?;
        for fold in folds {
            let compatible = fold.ndim() == first.ndim()
                && fold
                    .shape()
                    .iter()
                    .zip(first.shape())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(ShapeError::Invalid(format!(
                    "cannot concatenate shapes {:?} and {:?} along axis {}",
                    first.shape(),
                    fold.shape(),
                    axis
                ))
                .into());
            }
        }
        let views: Vec<_> = folds.iter().map(|f| f.nodes.view()).collect();
        ndarray::concatenate(Axis(axis), &views)
            .map(Self::from_array)
            .map_err(|e| ShapeError::Invalid(e.to_string()).into())
    }

    pub fn shape(&self) -> &[usize] {
        self.nodes.shape()
    }

    pub fn ndim(&self) -> usize {
        self.nodes.ndim()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &ArrayD<Node> {
        &self.nodes
    }

    pub fn into_nodes(self) -> ArrayD<Node> {
        self.nodes
    }

    pub fn get(&self, index: &[usize]) -> Option<&Node> {
        if index.len() != self.ndim() {
            return None;
        }
        self.nodes.get(IxDyn(index))
    }

    /// Nodes in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// The node of a rank-0 Fold
    pub fn as_node(&self) -> Option<&Node> {
        if self.ndim() == 0 {
            self.nodes.first()
        } else {
            None
        }
    }

    /// Output size of every node
    pub fn sizes(&self) -> ArrayD<usize> {
        self.nodes.map(Node::size_out)
    }

    /// Apply `f` to every node, keeping the shape
    pub fn map<F>(&self, mut f: F) -> GraphResult<Fold>
    where
        F: FnMut(&Node) -> GraphResult<Node>,
    {
        let nodes = self.iter().map(&mut f).collect::<GraphResult<Vec<_>>>()?;
        Self::from_shape_vec(self.shape(), nodes)
    }

    pub fn reshape(&self, shape: &[usize]) -> GraphResult<Fold> {
        if shape.iter().product::<usize>() != self.len() {
            return Err(ShapeError::Invalid(format!(
                "cannot reshape {:?} into {:?}",
                self.shape(),
                shape
            ))
            .into());
        }
        Self::from_shape_vec(shape, self.iter().cloned().collect())
    }

    /// Reverse the axes
    pub fn transpose(&self) -> Fold {
        Self::from_array(self.nodes.t().to_owned())
    }

    pub fn permute_axes(&self, axes: &[usize]) -> GraphResult<Fold> {
        let mut seen = vec![false; self.ndim()];
        let valid = axes.len() == self.ndim()
            && axes
                .iter()
                .all(|&a| a < seen.len() && !std::mem::replace(&mut seen[a], true));
        if !valid {
            return Err(ShapeError::Invalid(format!(
                "{:?} is not a permutation of the axes of {:?}",
                axes,
                self.shape()
            ))
            .into());
        }
        Ok(Self::from_array(
            self.nodes.clone().permuted_axes(IxDyn(axes)),
        ))
    }

    /// Fold with `axis` removed at position `index`
    pub fn index_axis(&self, axis: usize, index: usize) -> GraphResult<Fold> {
        check_axis(axis, self.ndim())?;
        if index >= self.shape()[axis] {
            return Err(ShapeError::Invalid(format!(
                "index {} out of bounds for axis {} of length {}",
                index,
                axis,
                self.shape()[axis]
            ))
            .into());
        }
        Ok(Self::from_array(
            self.nodes.index_axis(Axis(axis), index).to_owned(),
        ))
    }

    pub fn slice_axis(&self, axis: usize, range: Range<usize>) -> GraphResult<Fold> {
        check_axis(axis, self.ndim())?;
        if range.start > range.end || range.end > self.shape()[axis] {
            return Err(ShapeError::Invalid(format!(
                "range {:?} out of bounds for axis {} of length {}",
                range,
                axis,
                self.shape()[axis]
            ))
            .into());
        }
        Ok(Self::from_array(
            self.nodes
                .slice_axis(Axis(axis), Slice::from(range))
                .to_owned(),
        ))
    }

    /// Gather `indices` along `axis` (repeats allowed)
    pub fn select(&self, axis: usize, indices: &[usize]) -> GraphResult<Fold> {
        check_axis(axis, self.ndim())?;
        if let Some(bad) = indices.iter().find(|&&i| i >= self.shape()[axis]) {
            return Err(ShapeError::Invalid(format!(
                "index {} out of bounds for axis {} of length {}",
                bad,
                axis,
                self.shape()[axis]
            ))
            .into());
        }
        Ok(Self::from_array(self.nodes.select(Axis(axis), indices)))
    }

    pub fn insert_axis(&self, axis: usize) -> GraphResult<Fold> {
        check_axis(axis, self.ndim() + 1)?;
        Ok(Self::from_array(self.nodes.clone().insert_axis(Axis(axis))))
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> GraphResult<Fold> {
        let view = self.nodes.broadcast(IxDyn(shape)).ok_or_else(|| {
            ShapeError::Broadcast {
                left: self.shape().to_vec(),
                right: shape.to_vec(),
            }
        })?;
        Ok(Self::from_array(view.to_owned()))
    }
}

impl From<Node> for Fold {
    fn from(node: Node) -> Self {
        Fold::from_node(node)
    }
}

impl fmt::Debug for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fold(shape={:?})", self.shape())
    }
}
