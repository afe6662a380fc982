// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Dispatch Registry
//!
//! Maps `(DispatchKind, name)` to an append-only chain of handlers. A call
//! consults the chain newest first; each handler either builds the result
//! or declines. When every operand is numeric, ufuncs are evaluated
//! directly instead, so `add(1.0, 2.0)` is `3.0` and builds no graph.
//!
//! The process-wide registry is created with the builtin handlers on first
//! use. Handlers are cloned out of the lock before they run, so a handler may
//! itself dispatch.

use ahash::AHashMap;
use ndarray::{ArrayD, IxDyn, Zip};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::config::Params;
use crate::error::{DispatchError, GraphError, GraphResult};
use crate::fold::broadcast_shapes;
use crate::operand::Operand;

/// Family an operation name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DispatchKind {
    /// Elementwise operation (`add`, `sin`, ...)
    Ufunc,
    /// Array function (`sum`, `concatenate`, ...)
    Function,
    /// Named method (`transform`, `bundle`, ...)
    Method,
}

impl fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchKind::Ufunc => write!(f, "ufunc"),
            DispatchKind::Function => write!(f, "function"),
            DispatchKind::Method => write!(f, "method"),
        }
    }
}

/// Outcome of one handler
#[derive(Debug, Clone)]
pub enum Dispatched {
    Handled(Operand),
    Declined,
}

/// Graph-construction implementation of an operation
pub type Handler = Arc<dyn Fn(&[Operand], &Params) -> GraphResult<Dispatched> + Send + Sync>;

/// Table of handler chains
#[derive(Clone, Default)]
pub struct DispatchRegistry {
    handlers: AHashMap<(DispatchKind, String), Vec<Handler>>,
}

impl DispatchRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the builtin operations installed
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::ops::install_builtins(&mut registry);
        registry
    }

    /// Append a handler to the chain for `(kind, name)`
    pub fn register<F>(&mut self, kind: DispatchKind, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Operand], &Params) -> GraphResult<Dispatched> + Send + Sync + 'static,
    {
        self.register_handler(kind, name, Arc::new(handler));
    }

    pub fn register_handler(
        &mut self,
        kind: DispatchKind,
        name: impl Into<String>,
        handler: Handler,
    ) {
        let name = name.into();
        trace!(target: "gyrus-graph", "registered {} handler for '{}'", kind, name);
        self.handlers.entry((kind, name)).or_default().push(handler);
    }

    pub fn handler_count(&self, kind: DispatchKind, name: &str) -> usize {
        self.handlers
            .get(&(kind, name.to_string()))
            .map_or(0, Vec::len)
    }

    fn chain(&self, kind: DispatchKind, name: &str) -> Vec<Handler> {
        self.handlers
            .get(&(kind, name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Route `name` to its handlers
    pub fn call(
        &self,
        kind: DispatchKind,
        name: &str,
        operands: &[Operand],
        params: &Params,
    ) -> GraphResult<Operand> {
        run_chain(kind, name, &self.chain(kind, name), operands, params)
    }
}

static GLOBAL_REGISTRY: Lazy<RwLock<DispatchRegistry>> =
    Lazy::new(|| RwLock::new(DispatchRegistry::with_builtins()));

/// Append a handler to the process-wide registry
pub fn register<F>(kind: DispatchKind, name: impl Into<String>, handler: F)
where
    F: Fn(&[Operand], &Params) -> GraphResult<Dispatched> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.write().register(kind, name, handler);
}

/// Append a prebuilt handler (e.g. from `Vectorized::into_handler`)
pub fn register_handler(kind: DispatchKind, name: impl Into<String>, handler: Handler) {
    GLOBAL_REGISTRY.write().register_handler(kind, name, handler);
}

pub fn handler_count(kind: DispatchKind, name: &str) -> usize {
    GLOBAL_REGISTRY.read().handler_count(kind, name)
}

/// Route `name` through the process-wide registry
pub fn dispatch(
    kind: DispatchKind,
    name: &str,
    operands: &[Operand],
    params: &Params,
) -> GraphResult<Operand> {
    let chain = GLOBAL_REGISTRY.read().chain(kind, name);
    run_chain(kind, name, &chain, operands, params)
}

fn run_chain(
    kind: DispatchKind,
    name: &str,
    chain: &[Handler],
    operands: &[Operand],
    params: &Params,
) -> GraphResult<Operand> {
    if kind == DispatchKind::Ufunc && !operands.iter().any(Operand::is_graph) {
        return numeric_ufunc(name, operands, params);
    }
    if chain.is_empty() {
        return Err(DispatchError::NoImplementation {
            op: name.to_string(),
        }
        .into());
    }
    for handler in chain.iter().rev() {
        if let Dispatched::Handled(result) = handler(operands, params)? {
            return Ok(result);
        }
    }
    Err(DispatchError::AllDeclined {
        op: name.to_string(),
        handlers: chain.len(),
    }
    .into())
}

/// Scalar function behind a unary ufunc name
pub(crate) fn unary_function(name: &str) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        "negative" => |x| -x,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tanh" => f64::tanh,
        "exp" => f64::exp,
        "abs" => f64::abs,
        "square" => |x| x * x,
        "sqrt" => f64::sqrt,
        "relu" => |x| x.max(0.0),
        _ => return None,
    };
    Some(f)
}

/// Scalar function behind a binary ufunc name
pub(crate) fn binary_function(name: &str) -> Option<fn(f64, f64) -> f64> {
    let f: fn(f64, f64) -> f64 = match name {
        "add" => |a, b| a + b,
        "subtract" => |a, b| a - b,
        "multiply" => |a, b| a * b,
        "divide" => |a, b| a / b,
        "power" => f64::powf,
        _ => return None,
    };
    Some(f)
}

fn numeric_ufunc(name: &str, operands: &[Operand], _params: &Params) -> GraphResult<Operand> {
    let arrays: Vec<ArrayD<f64>> = operands.iter().filter_map(Operand::as_numeric).collect();
    let result = match (arrays.as_slice(), unary_function(name), binary_function(name)) {
        ([x], Some(f), _) => x.mapv(f),
        ([a, b], _, Some(f)) => {
            let shape = broadcast_shapes(a.shape(), b.shape())?;
            let (a, b) = match (a.broadcast(IxDyn(&shape)), b.broadcast(IxDyn(&shape))) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(GraphError::invalid(format!(
                        "cannot broadcast {:?} and {:?}",
                        a.shape(),
                        b.shape()
                    )))
                }
            };
            Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y))
        }
        (_, None, None) => {
            return Err(DispatchError::NoImplementation {
                op: name.to_string(),
            }
            .into())
        }
        _ => {
            return Err(GraphError::bad_arguments(
                name,
                format!("unexpected number of operands ({})", operands.len()),
            ))
        }
    };
    if result.ndim() == 0 {
        let value = result.iter().next().copied().unwrap_or(f64::NAN);
        Ok(Operand::Scalar(value))
    } else {
        Ok(Operand::Array(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use ndarray::arr1;

    #[test]
    fn test_numeric_fallback() {
        let registry = DispatchRegistry::new();
        let out = registry
            .call(DispatchKind::Ufunc, "add", &[1.0.into(), 2.0.into()], &Params::new())
            .unwrap();
        assert!(matches!(out, Operand::Scalar(v) if v == 3.0));

        let out = registry
            .call(
                DispatchKind::Ufunc,
                "square",
                &[arr1(&[1.0, -2.0]).into_dyn().into()],
                &Params::new(),
            )
            .unwrap();
        assert_eq!(out.as_numeric().unwrap(), arr1(&[1.0, 4.0]).into_dyn());
    }

    #[test]
    fn test_no_implementation_then_registered() {
        let mut registry = DispatchRegistry::new();
        let x = ops::stimulus(vec![1.0]).unwrap();

        let err = registry
            .call(DispatchKind::Function, "twice", &[x.clone().into()], &Params::new())
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Dispatch(DispatchError::NoImplementation {
                op: "twice".to_string()
            })
        );

        registry.register(DispatchKind::Function, "twice", |operands, _params| {
            let node = operands[0].clone().into_node()?;
            ops::scale_node(&node, 2.0).map(|n| Dispatched::Handled(n.into()))
        });
        let out = registry
            .call(DispatchKind::Function, "twice", &[x.into()], &Params::new())
            .unwrap();
        assert_eq!(out.into_node().unwrap().op_kind(), "transform");
    }

    #[test]
    fn test_all_declined() {
        let mut registry = DispatchRegistry::new();
        registry.register(DispatchKind::Method, "picky", |_, _| Ok(Dispatched::Declined));
        registry.register(DispatchKind::Method, "picky", |_, _| Ok(Dispatched::Declined));
        let x = ops::stimulus(vec![1.0]).unwrap();
        let err = registry
            .call(DispatchKind::Method, "picky", &[x.into()], &Params::new())
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Dispatch(DispatchError::AllDeclined {
                op: "picky".to_string(),
                handlers: 2
            })
        );
    }

    #[test]
    fn test_newest_handler_consulted_first() {
        let mut registry = DispatchRegistry::new();
        registry.register(DispatchKind::Ufunc, "pick", |_, _| {
            Ok(Dispatched::Handled(Operand::Scalar(1.0)))
        });
        registry.register(DispatchKind::Ufunc, "pick", |_, _| {
            Ok(Dispatched::Handled(Operand::Scalar(2.0)))
        });
        let x = ops::stimulus(vec![1.0]).unwrap();
        let out = registry
            .call(DispatchKind::Ufunc, "pick", &[x.into()], &Params::new())
            .unwrap();
        assert!(matches!(out, Operand::Scalar(v) if v == 2.0));
        assert_eq!(registry.handler_count(DispatchKind::Ufunc, "pick"), 2);
    }
}
