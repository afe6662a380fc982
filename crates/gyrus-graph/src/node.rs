// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Node
//!
//! Immutable, reference-counted record of one operation: what it lowers to,
//! its ordered inputs, its per-instant output size, and any configuration it
//! carries. Identity is the allocation, never the value: two equal
//! constructions are distinct nodes, and a node is shared only by cloning
//! the handle to it.

use std::fmt;
use std::sync::Arc;

use crate::config::Params;
use crate::error::{GraphError, GraphResult};
use crate::vectorize::ElementBuilder;

/// Identity of a live node (its allocation address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

pub(crate) enum NodeKind {
    /// Lowered by an element builder
    Element(Arc<dyn ElementBuilder>),
    /// Stand-in for an integrator's own output inside its integrand
    State,
    /// `dx/dt = input + integrand(x)`
    Integrate {
        state: Node,
        integrand: Option<Node>,
    },
}

pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<Node>,
    pub(crate) size_out: usize,
    pub(crate) overlay: Params,
    pub(crate) explicit: Params,
}

/// Shared reference to an operation in the graph
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
    /// Create a node lowered by `element`, checking input sizes eagerly
    pub fn from_element(
        element: Arc<dyn ElementBuilder>,
        inputs: Vec<Node>,
        explicit: Params,
    ) -> GraphResult<Node> {
        let sizes: Vec<usize> = inputs.iter().map(Node::size_out).collect();
        let size_out = element.size_out(&sizes)?;
        if size_out == 0 {
            return Err(GraphError::invalid(format!(
                "{} node would have an empty output",
                element.name()
            )));
        }
        Ok(Node(Arc::new(NodeData {
            kind: NodeKind::Element(element),
            inputs,
            size_out,
            overlay: Params::new(),
            explicit,
        })))
    }

    pub(crate) fn with_overlay(
        element: Arc<dyn ElementBuilder>,
        input: Node,
        overlay: Params,
    ) -> Node {
        let size_out = input.size_out();
        Node(Arc::new(NodeData {
            kind: NodeKind::Element(element),
            inputs: vec![input],
            size_out,
            overlay,
            explicit: Params::new(),
        }))
    }

    pub(crate) fn state(input: &Node) -> Node {
        Node(Arc::new(NodeData {
            kind: NodeKind::State,
            inputs: vec![input.clone()],
            size_out: input.size_out(),
            overlay: Params::new(),
            explicit: Params::new(),
        }))
    }

    pub(crate) fn integrator(input: Node, state: Node, integrand: Option<Node>) -> Node {
        let size_out = input.size_out();
        Node(Arc::new(NodeData {
            kind: NodeKind::Integrate { state, integrand },
            inputs: vec![input],
            size_out,
            overlay: Params::new(),
            explicit: Params::new(),
        }))
    }

    pub(crate) fn data(&self) -> &NodeData {
        &self.0
    }

    /// Operation identifier, e.g. `"transform"` or a user kind name
    pub fn op_kind(&self) -> &str {
        match &self.0.kind {
            NodeKind::Element(element) => element.name(),
            NodeKind::State => "state",
            NodeKind::Integrate { .. } => "integrate",
        }
    }

    pub fn inputs(&self) -> &[Node] {
        &self.0.inputs
    }

    /// Per-instant output dimensionality
    pub fn size_out(&self) -> usize {
        self.0.size_out
    }

    /// Configuration this node applies downstream (non-empty on configure nodes)
    pub fn overlay(&self) -> &Params {
        &self.0.overlay
    }

    /// Values supplied explicitly when the node was constructed
    pub fn explicit_params(&self) -> &Params {
        &self.0.explicit
    }

    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0) as usize)
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Integrand subgraph of an integrate node
    pub fn integrand(&self) -> Option<&Node> {
        match &self.0.kind {
            NodeKind::Integrate { integrand, .. } => integrand.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, size={})", self.op_kind(), self.size_out())
    }
}
