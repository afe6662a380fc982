// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Method forms of the construction operations on [`Fold`] and [`Node`]

use ndarray::{Array1, Array2};

use crate::config::Params;
use crate::error::GraphResult;
use crate::fold::Fold;
use crate::node::Node;
use crate::operand::Operand;

impl Fold {
    pub fn add(&self, other: impl Into<Operand>) -> GraphResult<Fold> {
        super::add(self, other)?.into_fold()
    }

    pub fn subtract(&self, other: impl Into<Operand>) -> GraphResult<Fold> {
        super::subtract(self, other)?.into_fold()
    }

    pub fn multiply(&self, other: impl Into<Operand>) -> GraphResult<Fold> {
        super::multiply(self, other)?.into_fold()
    }

    pub fn divide(&self, other: impl Into<Operand>) -> GraphResult<Fold> {
        super::divide(self, other)?.into_fold()
    }

    pub fn power(&self, exponent: f64) -> GraphResult<Fold> {
        super::power(self, exponent)?.into_fold()
    }

    pub fn negative(&self) -> GraphResult<Fold> {
        super::negative(self)?.into_fold()
    }

    /// Elementwise unary operation by name (`sin`, `tanh`, `relu`, ...)
    pub fn apply(&self, ufunc: &str) -> GraphResult<Fold> {
        super::ufunc(ufunc, &[self.into()])?.into_fold()
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> GraphResult<Fold> {
        super::transform(self, matrix)?.into_fold()
    }

    pub fn decode<F>(&self, function: F, size_out: Option<usize>) -> GraphResult<Fold>
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        super::decode(self, function, size_out)?.into_fold()
    }

    pub fn decode_with<F>(
        &self,
        function: F,
        size_out: Option<usize>,
        params: Params,
    ) -> GraphResult<Fold>
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        super::decode_with(self, function, size_out, params)?.into_fold()
    }

    pub fn filter(&self, tau: Option<f64>) -> GraphResult<Fold> {
        super::filter(self, tau)?.into_fold()
    }

    /// Select output dimensions of every node
    pub fn slice_outputs(&self, indices: &[usize]) -> GraphResult<Fold> {
        super::slice(self, indices)?.into_fold()
    }

    pub fn bundle(&self, axis: usize) -> GraphResult<Fold> {
        super::bundle(self, axis)?.into_fold()
    }

    pub fn unbundle(&self, axis: usize) -> GraphResult<Fold> {
        super::unbundle(self, axis)?.into_fold()
    }

    pub fn sum(&self, axis: Option<isize>) -> GraphResult<Operand> {
        super::sum(self, axis)
    }

    pub fn mean(&self, axis: Option<isize>) -> GraphResult<Operand> {
        super::mean(self, axis)
    }

    pub fn dot(&self, weights: &Array1<f64>) -> GraphResult<Fold> {
        super::dot(self, weights)?.into_fold()
    }

    pub fn configure(&self, overlay: Params) -> GraphResult<Fold> {
        super::configure(self, overlay)?.into_fold()
    }

    pub fn integrate(&self) -> GraphResult<Fold> {
        super::integrate(self)?.into_fold()
    }

    pub fn integrate_with<F>(&self, integrand: F) -> GraphResult<Fold>
    where
        F: Fn(&Node) -> GraphResult<Node>,
    {
        super::integrate_with(self, integrand)?.into_fold()
    }

    pub fn lti(&self, a: &Array2<f64>, b: &Array2<f64>) -> GraphResult<Fold> {
        super::lti(self, a, b)?.into_fold()
    }

    pub fn lti_with<F>(&self, a: &Array2<f64>, b: &Array2<f64>, state: F) -> GraphResult<Fold>
    where
        F: Fn(&Node) -> GraphResult<Node>,
    {
        super::lti_with(self, a, b, state)?.into_fold()
    }
}

impl Node {
    pub fn add(&self, other: impl Into<Operand>) -> GraphResult<Operand> {
        super::add(self, other)
    }

    pub fn subtract(&self, other: impl Into<Operand>) -> GraphResult<Operand> {
        super::subtract(self, other)
    }

    pub fn multiply(&self, other: impl Into<Operand>) -> GraphResult<Operand> {
        super::multiply(self, other)
    }

    pub fn divide(&self, other: impl Into<Operand>) -> GraphResult<Operand> {
        super::divide(self, other)
    }

    pub fn power(&self, exponent: f64) -> GraphResult<Node> {
        super::power(self, exponent)?.into_node()
    }

    pub fn negative(&self) -> GraphResult<Node> {
        super::negative(self)?.into_node()
    }

    pub fn apply(&self, ufunc: &str) -> GraphResult<Node> {
        super::ufunc(ufunc, &[self.into()])?.into_node()
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> GraphResult<Node> {
        super::transform(self, matrix)?.into_node()
    }

    pub fn decode<F>(&self, function: F, size_out: Option<usize>) -> GraphResult<Node>
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        super::decode(self, function, size_out)?.into_node()
    }

    pub fn filter(&self, tau: Option<f64>) -> GraphResult<Node> {
        super::filter(self, tau)?.into_node()
    }

    pub fn slice_outputs(&self, indices: &[usize]) -> GraphResult<Node> {
        super::slice_node(self, indices)
    }

    /// Split into size-1 nodes along a new axis
    pub fn unbundle(&self) -> GraphResult<Fold> {
        super::unbundle(self, 0)?.into_fold()
    }

    pub fn configure(&self, overlay: Params) -> Node {
        super::configure_node(self, overlay)
    }

    pub fn integrate(&self) -> GraphResult<Node> {
        super::integrate(self)?.into_node()
    }

    pub fn integrate_with<F>(&self, integrand: F) -> GraphResult<Node>
    where
        F: FnOnce(&Node) -> GraphResult<Node>,
    {
        super::integrate_node(self, Some(integrand))
    }

    pub fn lti(&self, a: &Array2<f64>, b: &Array2<f64>) -> GraphResult<Node> {
        self.lti_with(a, b, |x| Ok(x.clone()))
    }

    /// `dx/dt = A·state(x) + B·u` for this node as `u`
    pub fn lti_with<F>(&self, a: &Array2<f64>, b: &Array2<f64>, state: F) -> GraphResult<Node>
    where
        F: FnOnce(&Node) -> GraphResult<Node>,
    {
        let driven = self.transform(b)?;
        driven.integrate_with(|x| super::transform_node(&state(x)?, a))
    }
}
