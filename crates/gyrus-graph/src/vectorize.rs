// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Vectorizing Combinator
//!
//! An [`ElementBuilder`] describes one element of a computation: how many
//! values it outputs for given input sizes, which parameters it reads from
//! the configuration resolver, and how it lowers onto a [`Target`].
//! [`vectorize`] turns it into a construction function that broadcasts over
//! Folds, creating one node per broadcast position.
//!
//! Every builtin node kind except `state` and `integrate` is an
//! `ElementBuilder`, so user-defined kinds go through the same path.

use gyrus_runtime::{Handle, Target};
use std::fmt;
use std::sync::Arc;

use crate::config::{Params, ResolvedConfig};
use crate::dispatch::{Dispatched, Handler};
use crate::error::{GraphResult, MakeResult};
use crate::node::Node;
use crate::operand::{broadcast_map, Element, Operand};
use crate::ops;

/// Single-element lowering plus its construction-time contract
pub trait ElementBuilder: Send + Sync {
    /// Kind name reported by `Node::op_kind`
    fn name(&self) -> &str;

    /// Parameters this element reads from the configuration resolver
    fn configurable(&self) -> &[&'static str] {
        &[]
    }

    /// Output size for the given input sizes; `ShapeError` if incompatible
    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize>;

    /// Realize the element on `target` given realized inputs
    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        config: &ResolvedConfig,
    ) -> MakeResult<Handle>;
}

/// Broadcasting construction function produced by [`vectorize`]
#[derive(Clone)]
pub struct Vectorized {
    element: Arc<dyn ElementBuilder>,
}

impl Vectorized {
    pub fn name(&self) -> &str {
        self.element.name()
    }

    /// Build with no explicit parameters
    pub fn call(&self, operands: &[Operand]) -> GraphResult<Operand> {
        self.call_with(operands, &Params::new())
    }

    /// Build with explicit per-call parameters
    ///
    /// Numeric operands become constant stimulus inputs. Explicit keys are
    /// checked against [`ElementBuilder::configurable`] when the node is
    /// materialized.
    pub fn call_with(&self, operands: &[Operand], params: &Params) -> GraphResult<Operand> {
        broadcast_map(operands, |elements| {
            let inputs = elements
                .iter()
                .map(|element| match element {
                    Element::Node(node) => Ok(node.clone()),
                    Element::Scalar(value) => ops::stimulus(vec![*value]),
                })
                .collect::<GraphResult<Vec<Node>>>()?;
            Node::from_element(self.element.clone(), inputs, params.clone())
        })
    }

    /// Dispatch handler that declines when no operand is graph-typed
    pub fn into_handler(self) -> Handler {
        Arc::new(move |operands: &[Operand], params: &Params| {
            if !operands.iter().any(Operand::is_graph) {
                return Ok(Dispatched::Declined);
            }
            self.call_with(operands, params).map(Dispatched::Handled)
        })
    }
}

impl fmt::Debug for Vectorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vectorized")
            .field("element", &self.element.name())
            .finish()
    }
}

/// Wrap a single-element builder into a broadcasting construction function
pub fn vectorize<E>(element: E) -> Vectorized
where
    E: ElementBuilder + 'static,
{
    Vectorized {
        element: Arc::new(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use ndarray::{arr1, Array2};

    /// Weighted difference `a - gain * b`
    struct Difference;

    impl ElementBuilder for Difference {
        fn name(&self) -> &str {
            "difference"
        }

        fn configurable(&self) -> &[&'static str] {
            &["gain"]
        }

        fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
            match sizes_in {
                [a, b] if a == b => Ok(*a),
                [a, b] => Err(GraphError::size_mismatch("difference", *a, *b)),
                _ => Err(GraphError::invalid("difference takes two inputs")),
            }
        }

        fn build(
            &self,
            target: &mut dyn Target,
            inputs: &[Handle],
            config: &ResolvedConfig,
        ) -> MakeResult<Handle> {
            let gain = config.get_f64("gain")?;
            let n = inputs[0].size();
            let handle = target.create_linear(
                inputs,
                vec![Array2::eye(n), Array2::eye(n) * -gain],
            )?;
            Ok(handle)
        }
    }

    #[test]
    fn test_broadcasts_over_folds() {
        let diff = vectorize(Difference);
        let a = ops::stimuli(&arr1(&[1.0, 2.0, 3.0]).into_dyn()).unwrap();
        let out = diff.call(&[a.into(), 1.0.into()]).unwrap();
        let fold = out.into_fold().unwrap();
        assert_eq!(fold.shape(), &[3]);
        for node in fold.iter() {
            assert_eq!(node.op_kind(), "difference");
            assert_eq!(node.inputs()[1].op_kind(), "stimulus");
        }
    }

    #[test]
    fn test_node_arguments_give_a_node() {
        let diff = vectorize(Difference);
        let a = ops::stimulus(vec![1.0, 2.0]).unwrap();
        let b = ops::stimulus(vec![0.0, 1.0]).unwrap();
        let out = diff.call(&[a.into(), b.into()]).unwrap();
        assert_eq!(out.into_node().unwrap().size_out(), 2);
    }

    #[test]
    fn test_size_rule_checked_eagerly() {
        let diff = vectorize(Difference);
        let a = ops::stimulus(vec![1.0, 2.0]).unwrap();
        let b = ops::stimulus(vec![1.0]).unwrap();
        assert!(matches!(
            diff.call(&[a.into(), b.into()]),
            Err(GraphError::Shape(_))
        ));
    }

    #[test]
    fn test_handler_declines_numeric_operands() {
        let handler = vectorize(Difference).into_handler();
        let result = handler(&[1.0.into(), 2.0.into()], &Params::new()).unwrap();
        assert!(matches!(result, Dispatched::Declined));
    }
}
