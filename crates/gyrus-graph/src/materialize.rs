// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Graph Materializer
//!
//! Lowers nodes onto a [`Target`]. A [`BuildContext`] owns the memo from
//! node identity to realized handle, so a node reachable along several paths
//! is realized once per context no matter how many roots are made through
//! it. Inputs are realized before the node itself, which makes the target's
//! creation order a valid evaluation order.
//!
//! Integrators are the one exception to plain post-order: the feedback
//! object is created first, the state placeholder is bound to it, and only
//! then is the integrand realized and the loop closed.
//!
//! Any failure poisons the context. The memo is cleared and every later
//! `make` returns [`MaterializationError::ContextPoisoned`], since the target
//! may hold a partially built subgraph.

use ahash::AHashMap;
use gyrus_runtime::{Handle, RuntimeError, Target};
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, trace, warn};

use crate::config::{check_overlay, resolve, ConfigDefaults};
use crate::error::{MakeResult, MaterializationError};
use crate::fold::Fold;
use crate::node::{Node, NodeId, NodeKind};

/// Ephemeral state of one materialization
pub struct BuildContext<'t> {
    target: &'t mut dyn Target,
    defaults: ConfigDefaults,
    /// Keeps each realized node alive so its identity cannot be reused
    built: AHashMap<NodeId, (Node, Handle)>,
    poisoned: bool,
}

impl<'t> BuildContext<'t> {
    /// Context resolving configuration against the process-wide defaults
    pub fn new(target: &'t mut dyn Target) -> Self {
        Self::with_defaults(target, ConfigDefaults::global())
    }

    pub fn with_defaults(target: &'t mut dyn Target, defaults: ConfigDefaults) -> Self {
        Self {
            target,
            defaults,
            built: AHashMap::new(),
            poisoned: false,
        }
    }

    /// Realize `node` and everything upstream of it that is not yet realized
    pub fn make(&mut self, node: &Node) -> MakeResult<Handle> {
        if self.poisoned {
            return Err(MaterializationError::ContextPoisoned.into());
        }
        let before = self.built.len();
        match self.make_node(node) {
            Ok(handle) => {
                debug!(
                    target: "gyrus-graph",
                    "made {:?} as {} ({} new nodes)",
                    node,
                    handle,
                    self.built.len() - before
                );
                Ok(handle)
            }
            Err(err) => {
                warn!(target: "gyrus-graph", "materialization of {:?} failed: {}", node, err);
                self.poisoned = true;
                self.built.clear();
                Err(err)
            }
        }
    }

    /// Realize every node of `fold`, keeping its shape
    pub fn make_fold(&mut self, fold: &Fold) -> MakeResult<ArrayD<Handle>> {
        let handles = fold
            .iter()
            .map(|node| self.make(node))
            .collect::<MakeResult<Vec<_>>>()?;
        ArrayD::from_shape_vec(IxDyn(fold.shape()), handles).map_err(|e| {
            MaterializationError::Runtime(RuntimeError::InvalidParameters(e.to_string())).into()
        })
    }

    /// Handle already realized for `node` in this context
    pub fn built(&self, node: &Node) -> Option<Handle> {
        self.built.get(&node.id()).map(|(_, handle)| *handle)
    }

    /// Number of nodes realized so far
    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn target(&mut self) -> &mut dyn Target {
        &mut *self.target
    }

    fn remember(&mut self, node: &Node, handle: Handle) {
        trace!(target: "gyrus-graph", "{:?} -> {}", node, handle);
        self.built.insert(node.id(), (node.clone(), handle));
    }

    fn make_node(&mut self, node: &Node) -> MakeResult<Handle> {
        if let Some(handle) = self.built(node) {
            return Ok(handle);
        }

        let handle = match &node.data().kind {
            NodeKind::State => return Err(MaterializationError::UnboundState.into()),
            NodeKind::Integrate { state, integrand } => {
                let mut inputs = Vec::with_capacity(1);
                for input in node.inputs() {
                    inputs.push(self.make_node(input)?);
                }
                let u = inputs
                    .first()
                    .copied()
                    .ok_or(MaterializationError::UnboundState)?;
                let feedback = self.target.create_feedback(u)?;
                self.remember(state, feedback);
                if let Some(integrand) = integrand {
                    let f = self.make_node(integrand)?;
                    self.target.connect_feedback(feedback, f)?;
                }
                feedback
            }
            NodeKind::Element(element) => {
                check_overlay(node, &self.defaults)?;
                let config = resolve(node, element.configurable(), &self.defaults)?;
                let mut inputs = Vec::with_capacity(node.inputs().len());
                for input in node.inputs() {
                    inputs.push(self.make_node(input)?);
                }
                let handle = element.build(&mut *self.target, &inputs, &config)?;
                if handle.size() != node.size_out() {
                    return Err(MaterializationError::SizeMismatch {
                        kind: node.op_kind().to_string(),
                        expected: node.size_out(),
                        actual: handle.size(),
                    }
                    .into());
                }
                handle
            }
        };
        self.remember(node, handle);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Params;
    use crate::error::{ConfigurationError, MakeError};
    use crate::ops;
    use gyrus_runtime::{Network, RuntimeObject};
    use ndarray::{arr1, array};

    #[test]
    fn test_shared_node_realized_once() {
        let mut net = Network::new();
        let a = ops::stimulus(vec![1.0]).unwrap();
        let b = ops::scale_node(&a, 2.0).unwrap();
        let c = ops::scale_node(&a, 3.0).unwrap();
        let d = ops::add(&b, &c).unwrap().into_node().unwrap();

        let mut ctx = BuildContext::new(&mut net);
        let h1 = ctx.make(&d).unwrap();
        let h2 = ctx.make(&d).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(ctx.built(&a), Some(Handle::new(0, 1)));
        assert_eq!(ctx.len(), 4);
        drop(ctx);
        assert_eq!(net.len(), 4);
    }

    #[test]
    fn test_equal_graphs_are_distinct() {
        let mut net = Network::new();
        let a = ops::stimulus(vec![1.0]).unwrap();
        let b = ops::stimulus(vec![1.0]).unwrap();
        let mut ctx = BuildContext::new(&mut net);
        let ha = ctx.make(&a).unwrap();
        let hb = ctx.make(&b).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn test_integrator_closes_loop() {
        let mut net = Network::new();
        let u = ops::stimulus(vec![1.0]).unwrap();
        let x = ops::integrate_node(&u, Some(|s: &Node| ops::scale_node(s, -1.0))).unwrap();

        let handle = BuildContext::new(&mut net).make(&x).unwrap();
        match net.object(handle).unwrap() {
            RuntimeObject::Feedback {
                integrand: Some(f), ..
            } => assert_eq!(net.object(*f).unwrap().kind(), "linear"),
            other => panic!("expected connected feedback, got {:?}", other),
        }
    }

    #[test]
    fn test_state_outside_integrand_is_unbound() {
        let mut net = Network::new();
        let u = ops::stimulus(vec![1.0]).unwrap();
        let mut leaked = None;
        ops::integrate_node(
            &u,
            Some(|s: &Node| {
                leaked = Some(s.clone());
                Ok(s.clone())
            }),
        )
        .unwrap();
        let leaked = leaked.unwrap();
        let err = BuildContext::new(&mut net).make(&leaked).unwrap_err();
        assert_eq!(err, MakeError::from(MaterializationError::UnboundState));
    }

    #[test]
    fn test_failure_poisons_context() {
        let mut net = Network::new();
        let a = ops::stimulus(vec![0.5]).unwrap();
        let bad = ops::configure_node(&a, Params::new().with("no_such_key", 1));
        let good = ops::stimulus(vec![1.0]).unwrap();

        let mut ctx = BuildContext::new(&mut net);
        ctx.make(&a).unwrap();
        let err = ctx.make(&bad).unwrap_err();
        assert!(matches!(
            err,
            MakeError::Configuration(ConfigurationError::UnknownParameter { .. })
        ));
        assert!(ctx.is_poisoned());
        assert!(ctx.is_empty());
        assert_eq!(
            ctx.make(&good),
            Err(MakeError::from(MaterializationError::ContextPoisoned))
        );
    }

    #[test]
    fn test_make_fold_keeps_shape() {
        let mut net = Network::new();
        let fold = ops::stimuli(&array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap();
        let fold = ops::transform(&fold, &array![[2.0]]).unwrap().into_fold().unwrap();
        let handles = BuildContext::new(&mut net).make_fold(&fold).unwrap();
        assert_eq!(handles.shape(), &[2, 2]);
        assert!(handles.iter().all(|h| h.size() == 1));

        let single = ops::stimuli(&arr1(&[1.0]).into_dyn()).unwrap();
        let mut other = Network::new();
        assert_eq!(
            BuildContext::new(&mut other).make_fold(&single).unwrap().len(),
            1
        );
    }
}
