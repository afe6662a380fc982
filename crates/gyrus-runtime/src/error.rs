// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for runtime operations

/// Errors raised while building or simulating a network
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Handle does not refer to an object of this network
    #[error("Invalid handle: object {id} (size {size}) does not exist in this network")]
    InvalidHandle { id: usize, size: usize },

    /// Invalid parameters provided to a `create_*` call
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A user function produced a vector of the wrong length
    #[error("Object {object} produced {actual} values, expected {expected}")]
    InvalidOutput {
        object: usize,
        expected: usize,
        actual: usize,
    },

    /// Operation not supported by this target or backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Unknown backend name
    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    /// Simulation could not be set up or stepped
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
