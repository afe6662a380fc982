// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator overloads; each goes through the dispatch registry like the
//! named operation it stands for

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::GraphResult;
use crate::fold::Fold;
use crate::node::Node;
use crate::operand::Operand;

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:path) => {
        impl<T: Into<Operand>> $trait<T> for &Fold {
            type Output = GraphResult<Fold>;

            fn $method(self, rhs: T) -> Self::Output {
                $op(self, rhs)?.into_fold()
            }
        }

        impl<T: Into<Operand>> $trait<T> for &Node {
            type Output = GraphResult<Operand>;

            fn $method(self, rhs: T) -> Self::Output {
                $op(self, rhs)
            }
        }
    };
}

binary_operator!(Add, add, super::add);
binary_operator!(Sub, sub, super::subtract);
binary_operator!(Mul, mul, super::multiply);
binary_operator!(Div, div, super::divide);

impl Neg for &Fold {
    type Output = GraphResult<Fold>;

    fn neg(self) -> Self::Output {
        super::negative(self)?.into_fold()
    }
}

impl Neg for &Node {
    type Output = GraphResult<Node>;

    fn neg(self) -> Self::Output {
        super::negative(self)?.into_node()
    }
}

#[cfg(test)]
mod tests {
    use crate::ops;
    use ndarray::arr1;

    #[test]
    fn test_operators_match_named_operations() {
        let x = ops::stimuli(&arr1(&[1.0, 2.0]).into_dyn()).unwrap();
        let y = (&x * 2.0).unwrap();
        assert_eq!(y.shape(), &[2]);
        assert!(y.iter().all(|n| n.op_kind() == "transform"));

        let z = (&x - &y).unwrap();
        assert!(z.get(&[1]).unwrap().inputs()[1].ptr_eq(y.get(&[1]).unwrap()));

        let n = (-&x).unwrap();
        assert_eq!(n.shape(), x.shape());
    }

    #[test]
    fn test_node_operators() {
        let a = ops::stimulus(vec![1.0]).unwrap();
        let b = ops::stimulus(vec![2.0]).unwrap();
        let sum = (&a + &b).unwrap().into_node().unwrap();
        assert_eq!(sum.inputs().len(), 2);
        let scaled = (&a / 4.0).unwrap().into_node().unwrap();
        assert_eq!(scaled.op_kind(), "transform");
    }
}
