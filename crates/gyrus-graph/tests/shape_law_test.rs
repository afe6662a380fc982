// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Property Tests: Broadcast Shape Law
//!
//! Elementwise construction over Folds must produce exactly the numpy
//! broadcast shape, and must fail with a shape error whenever numpy would.

use gyrus_graph::prelude::*;
use gyrus_graph::{broadcast_shapes, GraphError};
use ndarray::{ArrayD, IxDyn};
use proptest::prelude::*;

/// Numpy broadcasting, written independently of the library
fn numpy_broadcast(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let n = a.len().max(b.len());
    let pad = |s: &[usize]| {
        let mut v = vec![1; n - s.len()];
        v.extend_from_slice(s);
        v
    };
    let (a, b) = (pad(a), pad(b));
    a.iter()
        .zip(&b)
        .map(|(&x, &y)| match (x, y) {
            _ if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

fn fold_of(shape: &[usize]) -> Fold {
    ops::stimuli(&ArrayD::zeros(IxDyn(shape))).unwrap()
}

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 0..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn broadcast_shapes_matches_numpy(a in shape_strategy(), b in shape_strategy()) {
        match numpy_broadcast(&a, &b) {
            Some(expected) => prop_assert_eq!(broadcast_shapes(&a, &b).unwrap(), expected),
            None => prop_assert!(broadcast_shapes(&a, &b).is_err()),
        }
    }

    #[test]
    fn elementwise_fold_shape_is_broadcast(a in shape_strategy(), b in shape_strategy()) {
        let (x, y) = (fold_of(&a), fold_of(&b));
        let result = ops::add(&x, &y);
        match numpy_broadcast(&a, &b) {
            Some(expected) => {
                let fold = result.unwrap().into_fold().unwrap();
                prop_assert_eq!(fold.shape(), expected.as_slice());
                prop_assert!(fold.iter().all(|n| n.op_kind() == "transform"));
            }
            None => prop_assert!(matches!(result, Err(GraphError::Shape(_)))),
        }
    }

    #[test]
    fn scalar_and_node_operands_keep_fold_shape(a in shape_strategy()) {
        let x = fold_of(&a);
        let node = ops::stimulus(vec![0.0]).unwrap();
        let scaled = x.multiply(3.0).unwrap();
        prop_assert_eq!(scaled.shape(), a.as_slice());
        let summed = x.add(&node).unwrap();
        prop_assert_eq!(summed.shape(), a.as_slice());
    }
}
