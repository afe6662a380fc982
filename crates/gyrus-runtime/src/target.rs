// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The object-creation interface graph materialization lowers into
//!
//! A `Target` accepts new primitive objects and connections and hands back
//! opaque [`Handle`]s. [`crate::Network`] is the in-process implementation;
//! anything else that can realize the same primitives (a remote simulator,
//! a recording mock in tests) can implement the trait instead.

use ndarray::Array2;
use std::fmt;
use std::str::FromStr;

use crate::error::{RuntimeError, RuntimeResult};
use crate::signal::{Signal, VectorFn};

/// Reference to a realized object: its index in the target and its output size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    id: usize,
    size: usize,
}

impl Handle {
    pub fn new(id: usize, size: usize) -> Self {
        Self { id, size }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Output dimensionality of the object
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}[{}]", self.id, self.size)
    }
}

/// Observation point registered with [`Target::attach_probe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeId(pub usize);

/// How a nonlinear object realizes its function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuronType {
    /// Evaluate the function exactly (no neural approximation)
    Direct,
    /// Rate-based leaky integrate-and-fire ensemble with least-squares decoders
    LifRate,
}

impl FromStr for NeuronType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> RuntimeResult<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(NeuronType::Direct),
            "lif_rate" | "lifrate" => Ok(NeuronType::LifRate),
            other => Err(RuntimeError::InvalidParameters(format!(
                "unknown neuron type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for NeuronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeuronType::Direct => write!(f, "direct"),
            NeuronType::LifRate => write!(f, "lif_rate"),
        }
    }
}

/// Resource knobs for a nonlinear object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearParams {
    pub n_neurons: usize,
    pub radius: f64,
    pub neuron_type: NeuronType,
    pub seed: u64,
}

impl Default for NonlinearParams {
    fn default() -> Self {
        Self {
            n_neurons: 100,
            radius: 1.0,
            neuron_type: NeuronType::Direct,
            seed: 0,
        }
    }
}

/// Object-creation interface of a simulation runtime
pub trait Target {
    /// Realize a leaf producing a constant or time-varying value
    fn create_source(&mut self, signal: Signal) -> RuntimeResult<Handle>;

    /// Realize `Σ coefficients[i] · inputs[i]`
    ///
    /// Every matrix must have `inputs[i].size()` columns and the same number
    /// of rows, which becomes the output size.
    fn create_linear(
        &mut self,
        inputs: &[Handle],
        coefficients: Vec<Array2<f64>>,
    ) -> RuntimeResult<Handle>;

    /// Realize an approximation of `function` applied to `input`
    fn create_nonlinear(
        &mut self,
        input: Handle,
        function: VectorFn,
        size_out: usize,
        params: NonlinearParams,
    ) -> RuntimeResult<Handle>;

    /// Realize an accumulator `dx/dt = input + integrand`
    ///
    /// The integrand is usually computed from the accumulator's own output,
    /// so it is attached afterwards with [`Target::connect_feedback`].
    fn create_feedback(&mut self, input: Handle) -> RuntimeResult<Handle>;

    /// Close the recurrent loop of a feedback object
    fn connect_feedback(&mut self, feedback: Handle, integrand: Handle) -> RuntimeResult<()>;

    /// Realize a first-order lowpass filter with time constant `tau` (0 passes through)
    fn create_filter(&mut self, input: Handle, tau: f64) -> RuntimeResult<Handle>;

    /// Whether [`Target::create_slice`] can connect to a sub-range of an output
    fn supports_partial_connection(&self) -> bool {
        false
    }

    /// Realize a view of `indices` of `input`'s output
    fn create_slice(&mut self, input: Handle, indices: &[usize]) -> RuntimeResult<Handle> {
        let _ = (input, indices);
        Err(RuntimeError::Unsupported(
            "partial connections are not supported by this target".to_string(),
        ))
    }

    /// Register an observation point
    fn attach_probe(&mut self, handle: Handle) -> RuntimeResult<ProbeId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neuron_type_parse() {
        assert_eq!("Direct".parse::<NeuronType>().unwrap(), NeuronType::Direct);
        assert_eq!("lif_rate".parse::<NeuronType>().unwrap(), NeuronType::LifRate);
        assert!("spiking".parse::<NeuronType>().is_err());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle::new(4, 2).to_string(), "#4[2]");
    }
}
