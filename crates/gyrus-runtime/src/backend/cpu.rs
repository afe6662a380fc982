// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CPU Backend
//!
//! Sequential reference backend: objects are evaluated one at a time in
//! creation order with plain loops. Creation order is a valid dependency
//! order because every object's in-step inputs are created before it.

use ndarray::{Array1, Array2};

use super::{CompiledNetwork, Recorder, SimulationBackend, SimulationData, Simulator};
use crate::error::RuntimeResult;
use crate::network::Network;

/// Sequential reference backend
#[derive(Debug, Clone, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SimulationBackend for CpuBackend {
    fn backend_name(&self) -> &str {
        "cpu"
    }

    fn build(&self, network: &Network, dt: f64) -> RuntimeResult<Box<dyn Simulator>> {
        let compiled = CompiledNetwork::compile(network, dt)?;
        Ok(Box::new(CpuSimulator::new(compiled)))
    }
}

fn matvec_loop(matrix: &Array2<f64>, x: &Array1<f64>, out: &mut Array1<f64>) {
    for (row, acc) in matrix.rows().into_iter().zip(out.iter_mut()) {
        let mut sum = 0.0;
        for (w, v) in row.iter().zip(x.iter()) {
            sum += w * v;
        }
        *acc += sum;
    }
}

struct CpuSimulator {
    compiled: CompiledNetwork,
    values: Vec<Array1<f64>>,
    recorder: Recorder,
    step_count: u64,
}

impl CpuSimulator {
    fn new(compiled: CompiledNetwork) -> Self {
        let values = compiled.initial_values();
        let recorder = Recorder::new(&compiled);
        Self {
            compiled,
            values,
            recorder,
            step_count: 0,
        }
    }
}

impl Simulator for CpuSimulator {
    fn step(&mut self) -> RuntimeResult<()> {
        let t = (self.step_count + 1) as f64 * self.compiled.dt;
        for index in 0..self.compiled.objects.len() {
            let out = self.compiled.evaluate(index, &self.values, t, matvec_loop)?;
            self.values[index] = out;
        }
        self.recorder.record(t, &self.values);
        self.compiled.integrate_feedback(&mut self.values);
        self.step_count += 1;
        Ok(())
    }

    fn time(&self) -> f64 {
        self.step_count as f64 * self.compiled.dt
    }

    fn data(&self) -> SimulationData {
        self.recorder.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use crate::target::Target;
    use ndarray::array;

    #[test]
    fn test_transform_one_step() {
        let mut net = Network::new();
        let a = net.create_source(Signal::scalar(1.0)).unwrap();
        let b = net.create_source(Signal::scalar(-1.0)).unwrap();
        let ta = net.create_linear(&[a], vec![array![[2.0]]]).unwrap();
        let tb = net.create_linear(&[b], vec![array![[2.0]]]).unwrap();
        let pa = net.attach_probe(ta).unwrap();
        let pb = net.attach_probe(tb).unwrap();

        let data = CpuBackend::new().simulate(&net, 1.0, 1.0).unwrap();
        assert_eq!(data.n_steps(), 1);
        assert_eq!(data.trace(pa).unwrap()[[0, 0]], 2.0);
        assert_eq!(data.trace(pb).unwrap()[[0, 0]], -2.0);
    }

    #[test]
    fn test_feedback_outputs_previous_state() {
        let mut net = Network::new();
        let u = net.create_source(Signal::scalar(1.0)).unwrap();
        let x = net.create_feedback(u).unwrap();
        let p = net.attach_probe(x).unwrap();

        let data = CpuBackend::new().simulate(&net, 0.3, 0.1).unwrap();
        let trace = data.trace(p).unwrap();
        assert_eq!(trace.shape(), &[3, 1]);
        assert!((trace[[0, 0]] - 0.0).abs() < 1e-12);
        assert!((trace[[1, 0]] - 0.1).abs() < 1e-12);
        assert!((trace[[2, 0]] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_zero_tau_filter_passes_through() {
        let mut net = Network::new();
        let s = net.create_source(Signal::function(1, |t| vec![t])).unwrap();
        let f = net.create_filter(s, 0.0).unwrap();
        let p = net.attach_probe(f).unwrap();

        let data = CpuBackend::new().simulate(&net, 0.5, 0.25).unwrap();
        let trace = data.trace(p).unwrap();
        assert_eq!(trace[[0, 0]], 0.25);
        assert_eq!(trace[[1, 0]], 0.5);
    }
}
