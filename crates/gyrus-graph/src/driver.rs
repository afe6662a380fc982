// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Execution Driver
//!
//! Runs a Fold end to end: a fresh [`Network`] is opened, the Fold is made
//! in its own build context, every leaf is probed, the network is simulated
//! and the probed traces are reassembled in the Fold's shape.
//!
//! ```text
//! Fold (3, 4) of size-d nodes, N steps
//!     TimeAxis::Trailing -> (3, 4, N, d)
//!     TimeAxis::Leading  -> (N, 3, 4, d)
//! ```

use gyrus_config::GyrusConfig;
use gyrus_runtime::{
    create_backend, BackendType, Handle, Network, ProbeId, RuntimeError, RuntimeResult,
    SimulationBackend, SimulationData, Target,
};
use ndarray::{Array2, ArrayD, IxDyn};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{RunError, RunResult, ShapeError};
use crate::fold::Fold;
use crate::materialize::BuildContext;
use crate::node::Node;

/// Position of the time axis in dense output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeAxis {
    Leading,
    #[default]
    Trailing,
}

impl FromStr for TimeAxis {
    type Err = RunError;

    fn from_str(s: &str) -> RunResult<Self> {
        match s.to_lowercase().as_str() {
            "leading" | "first" => Ok(TimeAxis::Leading),
            "trailing" | "last" => Ok(TimeAxis::Trailing),
            other => Err(RunError::InvalidOptions(format!(
                "unknown time axis '{}' (expected 'leading' or 'trailing')",
                other
            ))),
        }
    }
}

impl fmt::Display for TimeAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeAxis::Leading => write!(f, "leading"),
            TimeAxis::Trailing => write!(f, "trailing"),
        }
    }
}

/// Probes attached to the leaves of a realized Fold
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    shape: Vec<usize>,
    probes: Vec<ProbeId>,
    sizes: Vec<usize>,
}

/// Attach one probe per handle, remembering the array structure
pub fn probe(target: &mut dyn Target, handles: &ArrayD<Handle>) -> RuntimeResult<Capture> {
    let mut probes = Vec::with_capacity(handles.len());
    let mut sizes = Vec::with_capacity(handles.len());
    for handle in handles.iter() {
        probes.push(target.attach_probe(*handle)?);
        sizes.push(handle.size());
    }
    Ok(Capture {
        shape: handles.shape().to_vec(),
        probes,
        sizes,
    })
}

impl Capture {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn probes(&self) -> &[ProbeId] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    fn trace<'d>(&self, data: &'d SimulationData, index: usize) -> RunResult<&'d Array2<f64>> {
        let probe = self.probes[index];
        let trace = data.trace(probe).ok_or_else(|| {
            RuntimeError::SimulationFailed(format!("no trace recorded for probe {}", probe.0))
        })?;
        if trace.ncols() != self.sizes[index] {
            return Err(ShapeError::SizeMismatch {
                op: "extract".to_string(),
                expected: self.sizes[index],
                actual: trace.ncols(),
            }
            .into());
        }
        Ok(trace)
    }

    /// Per-leaf `steps × size` traces arranged in the captured shape
    pub fn extract(&self, data: &SimulationData) -> RunResult<ArrayD<Array2<f64>>> {
        let traces = (0..self.len())
            .map(|i| self.trace(data, i).map(Array2::clone))
            .collect::<RunResult<Vec<_>>>()?;
        ArrayD::from_shape_vec(IxDyn(&self.shape), traces)
            .map_err(|e| ShapeError::Invalid(e.to_string()).into())
    }

    /// All traces in one array; every leaf must have the same size
    pub fn extract_dense(
        &self,
        data: &SimulationData,
        time_axis: TimeAxis,
    ) -> RunResult<ArrayD<f64>> {
        let size = self.sizes.first().copied().unwrap_or(0);
        if let Some(&other) = self.sizes.iter().find(|&&s| s != size) {
            return Err(ShapeError::Invalid(format!(
                "cannot stack traces of sizes {} and {} into one array",
                size, other
            ))
            .into());
        }

        let steps = data.n_steps();
        let mut values = Vec::with_capacity(self.len() * steps * size);
        for i in 0..self.len() {
            values.extend(self.trace(data, i)?.iter().copied());
        }

        let ndim = self.shape.len();
        let mut shape = self.shape.clone();
        shape.extend([steps, size]);
        let trailing = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| ShapeError::Invalid(e.to_string()))?;

        Ok(match time_axis {
            TimeAxis::Trailing => trailing,
            TimeAxis::Leading => {
                let mut axes = vec![ndim];
                axes.extend(0..ndim);
                axes.push(ndim + 1);
                trailing
                    .permuted_axes(IxDyn(&axes))
                    .as_standard_layout()
                    .into_owned()
            }
        })
    }
}

/// Simulation settings of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Simulated time in seconds
    pub duration: f64,
    pub dt: f64,
    pub backend: BackendType,
    pub time_axis: TimeAxis,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            duration: 1.0,
            dt: 0.001,
            backend: BackendType::default(),
            time_axis: TimeAxis::default(),
        }
    }
}

impl RunOptions {
    /// Options from the `[simulation]` section of a loaded configuration
    pub fn from_config(config: &GyrusConfig) -> RunResult<Self> {
        Ok(Self {
            dt: config.simulation.dt,
            backend: config.simulation.backend.parse()?,
            time_axis: config.simulation.time_axis.parse()?,
            ..Self::default()
        })
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_axis(mut self, time_axis: TimeAxis) -> Self {
        self.time_axis = time_axis;
        self
    }

    fn validate(&self) -> RunResult<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(RunError::InvalidOptions(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !(self.duration >= 0.0) || !self.duration.is_finite() {
            return Err(RunError::InvalidOptions(format!(
                "duration must be non-negative, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

/// Make, probe and simulate `fold` on the backend named by `options`
pub fn run(fold: &Fold, options: &RunOptions) -> RunResult<ArrayD<f64>> {
    let backend = create_backend(options.backend);
    run_with(fold, options, backend.as_ref())
}

/// [`run`] on an explicit backend
pub fn run_with(
    fold: &Fold,
    options: &RunOptions,
    backend: &dyn SimulationBackend,
) -> RunResult<ArrayD<f64>> {
    options.validate()?;

    let mut network = Network::with_label("run");
    let handles = BuildContext::new(&mut network).make_fold(fold)?;
    let capture = probe(&mut network, &handles)?;
    info!(
        target: "gyrus-graph",
        "running Fold {:?}: {} objects, {} probes, {}s at dt={} on {}",
        fold.shape(),
        network.len(),
        capture.len(),
        options.duration,
        options.dt,
        backend.backend_name()
    );

    let data = backend.simulate(&network, options.duration, options.dt)?;
    capture.extract_dense(&data, options.time_axis)
}

/// Run a single node; the result is `steps × size`
pub fn run_node(node: &Node, options: &RunOptions) -> RunResult<Array2<f64>> {
    // a rank-0 Fold puts time first under either axis setting
    run(&Fold::from_node(node.clone()), options)?
        .into_dimensionality()
        .map_err(|e| ShapeError::Invalid(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use ndarray::{arr1, array};

    fn one_step() -> RunOptions {
        RunOptions::default().with_duration(1.0).with_dt(1.0)
    }

    #[test]
    fn test_transform_scenario() {
        let fold = ops::stimuli(&arr1(&[1.0, -1.0]).into_dyn()).unwrap();
        let fold = fold.transform(&array![[2.0]]).unwrap();
        let out = run(&fold, &one_step()).unwrap();
        assert_eq!(out.shape(), &[2, 1, 1]);
        assert_eq!(out[[0, 0, 0]], 2.0);
        assert_eq!(out[[1, 0, 0]], -2.0);
    }

    #[test]
    fn test_time_axis_placement() {
        let fold = ops::stimuli(&array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn()).unwrap();
        let options = RunOptions::default().with_duration(0.003).with_dt(0.001);
        let trailing = run(&fold, &options).unwrap();
        assert_eq!(trailing.shape(), &[2, 3, 3, 1]);
        let leading = run(&fold, &options.with_time_axis(TimeAxis::Leading)).unwrap();
        assert_eq!(leading.shape(), &[3, 2, 3, 1]);
        assert_eq!(leading[[2, 1, 0, 0]], 4.0);
        assert_eq!(trailing[[1, 0, 2, 0]], 4.0);
    }

    #[test]
    fn test_ragged_sizes_rejected_when_dense() {
        let fold = Fold::from_shape_vec(
            &[2],
            vec![
                ops::stimulus(vec![1.0]).unwrap(),
                ops::stimulus(vec![1.0, 2.0]).unwrap(),
            ],
        )
        .unwrap();
        let result = run(&fold, &one_step());
        assert!(matches!(result, Err(RunError::Graph(_))));
    }

    #[test]
    fn test_extract_keeps_ragged_traces() {
        let fold = Fold::from_shape_vec(
            &[2],
            vec![
                ops::stimulus(vec![1.0]).unwrap(),
                ops::stimulus(vec![1.0, 2.0]).unwrap(),
            ],
        )
        .unwrap();
        let mut net = Network::new();
        let handles = BuildContext::new(&mut net).make_fold(&fold).unwrap();
        let capture = probe(&mut net, &handles).unwrap();
        let data = create_backend(BackendType::Cpu)
            .simulate(&net, 2.0, 1.0)
            .unwrap();
        let traces = capture.extract(&data).unwrap();
        assert_eq!(traces[[0]].dim(), (2, 1));
        assert_eq!(traces[[1]].dim(), (2, 2));
        assert_eq!(traces[[1]][[1, 1]], 2.0);
    }

    #[test]
    fn test_invalid_options() {
        let fold = ops::stimuli(&arr1(&[1.0]).into_dyn()).unwrap();
        let result = run(&fold, &RunOptions::default().with_dt(0.0));
        assert!(matches!(result, Err(RunError::InvalidOptions(_))));
        assert!("sideways".parse::<TimeAxis>().is_err());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = GyrusConfig::default();
        config.simulation.backend = "batched".to_string();
        config.simulation.time_axis = "leading".to_string();
        config.simulation.dt = 0.01;
        let options = RunOptions::from_config(&config).unwrap();
        assert_eq!(options.backend, BackendType::Batched);
        assert_eq!(options.time_axis, TimeAxis::Leading);
        assert_eq!(options.dt, 0.01);

        config.simulation.backend = "quantum".to_string();
        assert!(matches!(
            RunOptions::from_config(&config),
            Err(RunError::Runtime(RuntimeError::InvalidBackend(_)))
        ));
    }
}
