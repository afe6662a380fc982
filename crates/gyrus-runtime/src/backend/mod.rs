// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simulation Backend Abstraction
//!
//! A backend turns a [`Network`] into a [`Simulator`] that advances all
//! objects in fixed time steps and records probed values. Both backends share
//! the compile step in this module (ensemble construction, filter decay
//! constants, index resolution) and differ only in how a step is scheduled.
//!
//! Step `k = 1..N` at `t = k·dt`:
//! 1. objects evaluate in dependency order; a feedback object outputs its
//!    state from before this step
//! 2. probes record the step's values
//! 3. every feedback state advances by `dt × (input + integrand)`

mod batched;
mod cpu;

pub use batched::BatchedBackend;
pub use cpu::CpuBackend;

use ndarray::{Array1, Array2};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::ensemble::LifEnsemble;
use crate::error::{RuntimeError, RuntimeResult};
use crate::network::{Network, RuntimeObject};
use crate::signal::{apply_checked, Signal, VectorFn};
use crate::target::{NeuronType, ProbeId};

/// Probed traces of a finished (or paused) simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationData {
    pub dt: f64,
    /// Time of each recorded step
    pub times: Vec<f64>,
    /// One `steps × size` array per probe, indexed by `ProbeId`
    pub traces: Vec<Array2<f64>>,
}

impl SimulationData {
    pub fn trace(&self, probe: ProbeId) -> Option<&Array2<f64>> {
        self.traces.get(probe.0)
    }

    pub fn n_steps(&self) -> usize {
        self.times.len()
    }
}

/// A network prepared for stepping
pub trait Simulator: Send {
    /// Advance one time step
    fn step(&mut self) -> RuntimeResult<()>;

    fn run_steps(&mut self, steps: usize) -> RuntimeResult<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Simulated time of the last completed step
    fn time(&self) -> f64;

    /// Snapshot of everything recorded so far
    fn data(&self) -> SimulationData;
}

/// Simulation backend trait (CPU reference, batched)
pub trait SimulationBackend: Send + Sync {
    /// Backend name for logging/debugging
    fn backend_name(&self) -> &str;

    /// Compile `network` for fixed step `dt`
    fn build(&self, network: &Network, dt: f64) -> RuntimeResult<Box<dyn Simulator>>;

    /// Build and run for `round(duration / dt)` steps
    fn simulate(&self, network: &Network, duration: f64, dt: f64) -> RuntimeResult<SimulationData> {
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(RuntimeError::InvalidParameters(format!(
                "duration must be non-negative, got {}",
                duration
            )));
        }
        let mut simulator = self.build(network, dt)?;
        let steps = (duration / dt).round() as usize;
        debug!(
            target: "gyrus-runtime",
            "[{}] simulating {} objects for {} steps (dt={})",
            self.backend_name(),
            network.len(),
            steps,
            dt
        );
        simulator.run_steps(steps)?;
        Ok(simulator.data())
    }
}

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Sequential reference backend
    #[default]
    Cpu,
    /// Dependency-level batches evaluated in parallel with dense linear algebra
    Batched,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "cpu"),
            BackendType::Batched => write!(f, "batched"),
        }
    }
}

impl FromStr for BackendType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> RuntimeResult<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "reference" => Ok(BackendType::Cpu),
            "batched" | "gpu" => Ok(BackendType::Batched),
            _ => Err(RuntimeError::InvalidBackend(s.to_string())),
        }
    }
}

/// Create a backend instance of the given type
pub fn create_backend(backend_type: BackendType) -> Box<dyn SimulationBackend> {
    match backend_type {
        BackendType::Cpu => Box::new(CpuBackend::new()),
        BackendType::Batched => Box::new(BatchedBackend::new()),
    }
}

/// `out += matrix · x`
pub(crate) type MatVecAccumulate = fn(&Array2<f64>, &Array1<f64>, &mut Array1<f64>);

/// Object lowered to its per-step evaluation form
pub(crate) enum CompiledObject {
    Source(Signal),
    Linear {
        inputs: Vec<usize>,
        coefficients: Vec<Array2<f64>>,
    },
    Direct {
        input: usize,
        function: VectorFn,
        size_out: usize,
    },
    Ensemble {
        input: usize,
        ensemble: LifEnsemble,
    },
    Feedback {
        input: usize,
        integrand: Option<usize>,
    },
    Filter {
        input: usize,
        decay: f64,
    },
    Slice {
        input: usize,
        indices: Vec<usize>,
    },
}

impl CompiledObject {
    /// Indices read while evaluating this object within a step
    pub fn step_inputs(&self) -> Vec<usize> {
        match self {
            CompiledObject::Source(_) | CompiledObject::Feedback { .. } => Vec::new(),
            CompiledObject::Linear { inputs, .. } => inputs.clone(),
            CompiledObject::Direct { input, .. }
            | CompiledObject::Ensemble { input, .. }
            | CompiledObject::Filter { input, .. }
            | CompiledObject::Slice { input, .. } => vec![*input],
        }
    }
}

/// Network compiled for a fixed step, shared by all backends
pub(crate) struct CompiledNetwork {
    pub dt: f64,
    pub objects: Vec<CompiledObject>,
    pub sizes: Vec<usize>,
    pub probes: Vec<usize>,
}

impl CompiledNetwork {
    pub fn compile(network: &Network, dt: f64) -> RuntimeResult<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(RuntimeError::InvalidParameters(format!(
                "dt must be positive, got {}",
                dt
            )));
        }

        let mut objects = Vec::with_capacity(network.len());
        let mut sizes = Vec::with_capacity(network.len());
        for (index, record) in network.objects().iter().enumerate() {
            let compiled = match &record.object {
                RuntimeObject::Source(signal) => CompiledObject::Source(signal.clone()),
                RuntimeObject::Linear {
                    inputs,
                    coefficients,
                } => CompiledObject::Linear {
                    inputs: inputs.iter().map(|h| h.id()).collect(),
                    coefficients: coefficients.clone(),
                },
                RuntimeObject::Nonlinear {
                    input,
                    function,
                    params,
                } => match params.neuron_type {
                    NeuronType::Direct => CompiledObject::Direct {
                        input: input.id(),
                        function: function.clone(),
                        size_out: record.size,
                    },
                    NeuronType::LifRate => CompiledObject::Ensemble {
                        input: input.id(),
                        ensemble: LifEnsemble::build(
                            function,
                            input.size(),
                            record.size,
                            params,
                            index,
                        )?,
                    },
                },
                RuntimeObject::Feedback { input, integrand } => CompiledObject::Feedback {
                    input: input.id(),
                    integrand: integrand.map(|h| h.id()),
                },
                RuntimeObject::Filter { input, tau } => CompiledObject::Filter {
                    input: input.id(),
                    decay: if *tau > 0.0 { (-dt / tau).exp() } else { 0.0 },
                },
                RuntimeObject::Slice { input, indices } => CompiledObject::Slice {
                    input: input.id(),
                    indices: indices.clone(),
                },
            };
            objects.push(compiled);
            sizes.push(record.size);
        }

        let probes = network.probes().iter().map(|h| h.id()).collect();
        Ok(Self {
            dt,
            objects,
            sizes,
            probes,
        })
    }

    /// Initial values: zeros everywhere, which is also every state's start
    pub fn initial_values(&self) -> Vec<Array1<f64>> {
        self.sizes.iter().map(|&n| Array1::zeros(n)).collect()
    }

    /// Output of object `index` at time `t`
    ///
    /// `values` holds this step's outputs for everything evaluated before
    /// `index` and the previous step's output of `index` itself.
    pub fn evaluate(
        &self,
        index: usize,
        values: &[Array1<f64>],
        t: f64,
        matvec: MatVecAccumulate,
    ) -> RuntimeResult<Array1<f64>> {
        let out = match &self.objects[index] {
            CompiledObject::Source(signal) => Array1::from(signal.sample(t, index)?),
            CompiledObject::Linear {
                inputs,
                coefficients,
            } => {
                let mut acc = Array1::zeros(self.sizes[index]);
                for (input, matrix) in inputs.iter().zip(coefficients) {
                    matvec(matrix, &values[*input], &mut acc);
                }
                acc
            }
            CompiledObject::Direct {
                input,
                function,
                size_out,
            } => {
                let x = values[*input].to_vec();
                Array1::from(apply_checked(function, &x, *size_out, index)?)
            }
            CompiledObject::Ensemble { input, ensemble } => ensemble.evaluate(&values[*input]),
            CompiledObject::Feedback { .. } => values[index].clone(),
            CompiledObject::Filter { input, decay } => {
                &values[index] * *decay + &values[*input] * (1.0 - decay)
            }
            CompiledObject::Slice { input, indices } => {
                let source = &values[*input];
                indices.iter().map(|&i| source[i]).collect()
            }
        };
        Ok(out)
    }

    /// Advance every feedback state by `dt × (input + integrand)`
    pub fn integrate_feedback(&self, values: &mut [Array1<f64>]) {
        for (index, object) in self.objects.iter().enumerate() {
            if let CompiledObject::Feedback { input, integrand } = object {
                let mut rate = values[*input].clone();
                if let Some(f) = integrand {
                    rate += &values[*f];
                }
                values[index].scaled_add(self.dt, &rate);
            }
        }
    }
}

/// Probe recording shared by all simulators
pub(crate) struct Recorder {
    dt: f64,
    times: Vec<f64>,
    probes: Vec<usize>,
    sizes: Vec<usize>,
    samples: Vec<Vec<f64>>,
}

impl Recorder {
    pub fn new(compiled: &CompiledNetwork) -> Self {
        Self {
            dt: compiled.dt,
            times: Vec::new(),
            probes: compiled.probes.clone(),
            sizes: compiled.probes.iter().map(|&p| compiled.sizes[p]).collect(),
            samples: vec![Vec::new(); compiled.probes.len()],
        }
    }

    pub fn record(&mut self, t: f64, values: &[Array1<f64>]) {
        self.times.push(t);
        for (samples, &probe) in self.samples.iter_mut().zip(&self.probes) {
            samples.extend(values[probe].iter().copied());
        }
    }

    pub fn data(&self) -> SimulationData {
        let steps = self.times.len();
        let traces = self
            .samples
            .iter()
            .zip(&self.sizes)
            .map(|(samples, &size)| {
                Array2::from_shape_fn((steps, size), |(i, j)| samples[i * size + j])
            })
            .collect();
        SimulationData {
            dt: self.dt,
            times: self.times.clone(),
            traces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_from_str() {
        assert_eq!("cpu".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!("reference".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!("GPU".parse::<BackendType>().unwrap(), BackendType::Batched);
        assert_eq!(
            "tpu".parse::<BackendType>(),
            Err(RuntimeError::InvalidBackend("tpu".to_string()))
        );
    }

    #[test]
    fn test_create_backend_names() {
        assert_eq!(create_backend(BackendType::Cpu).backend_name(), "cpu");
        assert_eq!(create_backend(BackendType::Batched).backend_name(), "batched");
    }

    #[test]
    fn test_compile_rejects_bad_dt() {
        let network = Network::new();
        assert!(CompiledNetwork::compile(&network, 0.0).is_err());
        assert!(CompiledNetwork::compile(&network, f64::NAN).is_err());
    }
}
