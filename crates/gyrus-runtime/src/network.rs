// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network
//!
//! Backend-independent object graph accumulated during materialization.
//! Objects are appended in creation order and every object's inputs exist
//! before it does; the only edge pointing forward is a feedback object's
//! integrand, which backends read after the step has been evaluated.

use ndarray::Array2;
use tracing::trace;

use crate::error::{RuntimeError, RuntimeResult};
use crate::signal::{Signal, VectorFn};
use crate::target::{Handle, NeuronType, NonlinearParams, ProbeId, Target};

/// A primitive object of the runtime
#[derive(Clone)]
pub enum RuntimeObject {
    Source(Signal),
    Linear {
        inputs: Vec<Handle>,
        coefficients: Vec<Array2<f64>>,
    },
    Nonlinear {
        input: Handle,
        function: VectorFn,
        params: NonlinearParams,
    },
    Feedback {
        input: Handle,
        integrand: Option<Handle>,
    },
    Filter {
        input: Handle,
        tau: f64,
    },
    Slice {
        input: Handle,
        indices: Vec<usize>,
    },
}

impl RuntimeObject {
    /// Short kind name, used in logs and tests
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeObject::Source(_) => "source",
            RuntimeObject::Linear { .. } => "linear",
            RuntimeObject::Nonlinear { .. } => "nonlinear",
            RuntimeObject::Feedback { .. } => "feedback",
            RuntimeObject::Filter { .. } => "filter",
            RuntimeObject::Slice { .. } => "slice",
        }
    }

    /// Handles read while evaluating this object within a step
    ///
    /// Feedback objects output their state, so they read nothing in-step.
    pub fn step_inputs(&self) -> Vec<Handle> {
        match self {
            RuntimeObject::Source(_) | RuntimeObject::Feedback { .. } => Vec::new(),
            RuntimeObject::Linear { inputs, .. } => inputs.clone(),
            RuntimeObject::Nonlinear { input, .. }
            | RuntimeObject::Filter { input, .. }
            | RuntimeObject::Slice { input, .. } => vec![*input],
        }
    }
}

impl std::fmt::Debug for RuntimeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeObject::Source(signal) => f.debug_tuple("Source").field(signal).finish(),
            RuntimeObject::Linear { inputs, .. } => {
                f.debug_struct("Linear").field("inputs", inputs).finish_non_exhaustive()
            }
            RuntimeObject::Nonlinear { input, params, .. } => f
                .debug_struct("Nonlinear")
                .field("input", input)
                .field("params", params)
                .finish_non_exhaustive(),
            RuntimeObject::Feedback { input, integrand } => f
                .debug_struct("Feedback")
                .field("input", input)
                .field("integrand", integrand)
                .finish(),
            RuntimeObject::Filter { input, tau } => f
                .debug_struct("Filter")
                .field("input", input)
                .field("tau", tau)
                .finish(),
            RuntimeObject::Slice { input, indices } => f
                .debug_struct("Slice")
                .field("input", input)
                .field("indices", indices)
                .finish(),
        }
    }
}

/// Stored object plus its output size
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub object: RuntimeObject,
    pub size: usize,
}

/// Ephemeral runtime context that accumulates realized objects and probes
#[derive(Debug, Clone, Default)]
pub struct Network {
    label: Option<String>,
    objects: Vec<ObjectRecord>,
    probes: Vec<Handle>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    /// Probed handles, indexed by `ProbeId`
    pub fn probes(&self) -> &[Handle] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, handle: Handle) -> RuntimeResult<&RuntimeObject> {
        self.check(handle)?;
        Ok(&self.objects[handle.id()].object)
    }

    /// Number of objects of each kind, in first-seen order
    pub fn kind_counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for record in &self.objects {
            let kind = record.object.kind();
            match counts.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((kind, 1)),
            }
        }
        counts
    }

    fn check(&self, handle: Handle) -> RuntimeResult<()> {
        match self.objects.get(handle.id()) {
            Some(record) if record.size == handle.size() => Ok(()),
            _ => Err(RuntimeError::InvalidHandle {
                id: handle.id(),
                size: handle.size(),
            }),
        }
    }

    fn push(&mut self, object: RuntimeObject, size: usize) -> Handle {
        let handle = Handle::new(self.objects.len(), size);
        trace!(target: "gyrus-runtime", "created {} object {}", object.kind(), handle);
        self.objects.push(ObjectRecord { object, size });
        handle
    }
}

impl Target for Network {
    fn create_source(&mut self, signal: Signal) -> RuntimeResult<Handle> {
        let size = signal.size();
        if size == 0 {
            return Err(RuntimeError::InvalidParameters(
                "source must produce at least one value".to_string(),
            ));
        }
        Ok(self.push(RuntimeObject::Source(signal), size))
    }

    fn create_linear(
        &mut self,
        inputs: &[Handle],
        coefficients: Vec<Array2<f64>>,
    ) -> RuntimeResult<Handle> {
        if inputs.is_empty() || inputs.len() != coefficients.len() {
            return Err(RuntimeError::InvalidParameters(format!(
                "linear object needs one coefficient matrix per input (got {} inputs, {} matrices)",
                inputs.len(),
                coefficients.len()
            )));
        }
        let rows = coefficients[0].nrows();
        if rows == 0 {
            return Err(RuntimeError::InvalidParameters(
                "linear object must have at least one output".to_string(),
            ));
        }
        for (input, matrix) in inputs.iter().zip(&coefficients) {
            self.check(*input)?;
            if matrix.nrows() != rows || matrix.ncols() != input.size() {
                return Err(RuntimeError::InvalidParameters(format!(
                    "coefficient matrix {:?} does not map input of size {} to {} outputs",
                    matrix.shape(),
                    input.size(),
                    rows
                )));
            }
        }
        let object = RuntimeObject::Linear {
            inputs: inputs.to_vec(),
            coefficients,
        };
        Ok(self.push(object, rows))
    }

    fn create_nonlinear(
        &mut self,
        input: Handle,
        function: VectorFn,
        size_out: usize,
        params: NonlinearParams,
    ) -> RuntimeResult<Handle> {
        self.check(input)?;
        if size_out == 0 {
            return Err(RuntimeError::InvalidParameters(
                "nonlinear object must have at least one output".to_string(),
            ));
        }
        if params.neuron_type == NeuronType::LifRate && params.n_neurons == 0 {
            return Err(RuntimeError::InvalidParameters(
                "n_neurons must be positive".to_string(),
            ));
        }
        if !(params.radius > 0.0) || !params.radius.is_finite() {
            return Err(RuntimeError::InvalidParameters(format!(
                "radius must be positive, got {}",
                params.radius
            )));
        }
        let object = RuntimeObject::Nonlinear {
            input,
            function,
            params,
        };
        Ok(self.push(object, size_out))
    }

    fn create_feedback(&mut self, input: Handle) -> RuntimeResult<Handle> {
        self.check(input)?;
        let object = RuntimeObject::Feedback {
            input,
            integrand: None,
        };
        Ok(self.push(object, input.size()))
    }

    fn connect_feedback(&mut self, feedback: Handle, integrand: Handle) -> RuntimeResult<()> {
        self.check(feedback)?;
        self.check(integrand)?;
        if integrand.size() != feedback.size() {
            return Err(RuntimeError::InvalidParameters(format!(
                "integrand of size {} cannot drive feedback of size {}",
                integrand.size(),
                feedback.size()
            )));
        }
        match &mut self.objects[feedback.id()].object {
            RuntimeObject::Feedback {
                integrand: slot @ None,
                ..
            } => {
                *slot = Some(integrand);
                trace!(target: "gyrus-runtime", "closed feedback {} with {}", feedback, integrand);
                Ok(())
            }
            RuntimeObject::Feedback { .. } => Err(RuntimeError::InvalidParameters(format!(
                "feedback {} is already connected",
                feedback
            ))),
            other => Err(RuntimeError::InvalidParameters(format!(
                "{} is a {} object, not feedback",
                feedback,
                other.kind()
            ))),
        }
    }

    fn create_filter(&mut self, input: Handle, tau: f64) -> RuntimeResult<Handle> {
        self.check(input)?;
        if !(tau >= 0.0) || !tau.is_finite() {
            return Err(RuntimeError::InvalidParameters(format!(
                "filter time constant must be non-negative, got {}",
                tau
            )));
        }
        Ok(self.push(RuntimeObject::Filter { input, tau }, input.size()))
    }

    fn supports_partial_connection(&self) -> bool {
        true
    }

    fn create_slice(&mut self, input: Handle, indices: &[usize]) -> RuntimeResult<Handle> {
        self.check(input)?;
        if indices.is_empty() {
            return Err(RuntimeError::InvalidParameters(
                "slice must select at least one index".to_string(),
            ));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= input.size()) {
            return Err(RuntimeError::InvalidParameters(format!(
                "slice index {} out of range for size {}",
                bad,
                input.size()
            )));
        }
        let object = RuntimeObject::Slice {
            input,
            indices: indices.to_vec(),
        };
        Ok(self.push(object, indices.len()))
    }

    fn attach_probe(&mut self, handle: Handle) -> RuntimeResult<ProbeId> {
        self.check(handle)?;
        self.probes.push(handle);
        Ok(ProbeId(self.probes.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_shape_validation() {
        let mut net = Network::new();
        let a = net.create_source(Signal::Constant(vec![1.0, 2.0])).unwrap();
        let bad = net.create_linear(&[a], vec![array![[1.0, 2.0, 3.0]]]);
        assert!(matches!(bad, Err(RuntimeError::InvalidParameters(_))));

        let ok = net.create_linear(&[a], vec![array![[1.0, 1.0]]]).unwrap();
        assert_eq!(ok.size(), 1);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut net = Network::new();
        let result = net.create_filter(Handle::new(7, 1), 0.01);
        assert_eq!(result, Err(RuntimeError::InvalidHandle { id: 7, size: 1 }));
    }

    #[test]
    fn test_feedback_connects_once() {
        let mut net = Network::new();
        let u = net.create_source(Signal::scalar(1.0)).unwrap();
        let x = net.create_feedback(u).unwrap();
        let f = net.create_linear(&[x], vec![array![[-1.0]]]).unwrap();
        net.connect_feedback(x, f).unwrap();
        assert!(net.connect_feedback(x, f).is_err());
        assert!(net.connect_feedback(f, x).is_err());
    }

    #[test]
    fn test_kind_counts() {
        let mut net = Network::new();
        let a = net.create_source(Signal::scalar(1.0)).unwrap();
        let b = net.create_source(Signal::scalar(2.0)).unwrap();
        net.create_slice(a, &[0]).unwrap();
        net.attach_probe(b).unwrap();
        assert_eq!(net.kind_counts(), vec![("source", 2), ("slice", 1)]);
        assert_eq!(net.probes(), &[b]);
    }
}
