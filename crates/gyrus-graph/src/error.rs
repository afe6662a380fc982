// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for graph construction, materialization and execution
//!
//! Construction errors ([`GraphError`]) are raised eagerly by the operation
//! that builds a bad graph. Materialization errors ([`MakeError`]) abort a
//! whole `make` call. [`RunError`] wraps both plus backend failures unchanged.

use gyrus_runtime::RuntimeError;

/// Incompatible shapes or output sizes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("Cannot broadcast shapes {left:?} and {right:?}")]
    Broadcast { left: Vec<usize>, right: Vec<usize> },

    #[error("{op}: expected size {expected}, got {actual}")]
    SizeMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("Axis {axis} out of bounds for rank {ndim}")]
    AxisOutOfBounds { axis: usize, ndim: usize },

    #[error("{0}")]
    Invalid(String),
}

/// Operation could not be routed to an implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("No implementation registered for '{op}'")]
    NoImplementation { op: String },

    #[error("All {handlers} handler(s) for '{op}' declined these operands")]
    AllDeclined { op: String, handlers: usize },

    #[error("Bad arguments to '{op}': {reason}")]
    BadArguments { op: String, reason: String },
}

/// Graph construction error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Result type for graph construction
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GraphError::Shape(ShapeError::Invalid(message.into()))
    }

    pub(crate) fn size_mismatch(op: &str, expected: usize, actual: usize) -> Self {
        GraphError::Shape(ShapeError::SizeMismatch {
            op: op.to_string(),
            expected,
            actual,
        })
    }

    pub(crate) fn bad_arguments(op: &str, reason: impl Into<String>) -> Self {
        GraphError::Dispatch(DispatchError::BadArguments {
            op: op.to_string(),
            reason: reason.into(),
        })
    }
}

/// Build parameter could not be resolved
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unknown parameter '{key}' on {kind} node")]
    UnknownParameter { key: String, kind: String },

    #[error("Parameter '{key}' expects {expected}, got {found}")]
    InvalidValue {
        key: String,
        expected: String,
        found: String,
    },

    #[error("No value or default for parameter '{key}' of {kind} node")]
    MissingValue { key: String, kind: String },
}

/// Runtime objects could not be created
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MaterializationError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Build context was poisoned by an earlier failure")]
    ContextPoisoned,

    #[error("State placeholder used outside the integrand of its integrator")]
    UnboundState,

    #[error("{kind} element realized an object of size {actual}, expected {expected}")]
    SizeMismatch {
        kind: String,
        expected: usize,
        actual: usize,
    },
}

/// Materialization error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MakeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Materialization error: {0}")]
    Materialization(#[from] MaterializationError),
}

impl From<RuntimeError> for MakeError {
    fn from(err: RuntimeError) -> Self {
        MakeError::Materialization(MaterializationError::Runtime(err))
    }
}

/// Result type for materialization
pub type MakeResult<T> = Result<T, MakeError>;

/// Execution driver error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Make(#[from] MakeError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Invalid run options: {0}")]
    InvalidOptions(String),
}

impl From<ShapeError> for RunError {
    fn from(err: ShapeError) -> Self {
        RunError::Graph(GraphError::Shape(err))
    }
}

/// Result type for the execution driver
pub type RunResult<T> = Result<T, RunError>;
