// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Batched Backend
//!
//! Groups objects into dependency levels at build time and evaluates each
//! level with `rayon`, using dense `ndarray` products for linear objects.
//! Sources and feedback objects read nothing within a step, so they form
//! level 0; every other object sits one level above its deepest input.

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::debug;

use super::{CompiledNetwork, Recorder, SimulationBackend, SimulationData, Simulator};
use crate::error::RuntimeResult;
use crate::network::Network;

/// Level-parallel backend standing in for an accelerator
#[derive(Debug, Clone, Default)]
pub struct BatchedBackend;

impl BatchedBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SimulationBackend for BatchedBackend {
    fn backend_name(&self) -> &str {
        "batched"
    }

    fn build(&self, network: &Network, dt: f64) -> RuntimeResult<Box<dyn Simulator>> {
        let compiled = CompiledNetwork::compile(network, dt)?;
        let levels = dependency_levels(&compiled);
        debug!(
            target: "gyrus-runtime",
            "[batched] {} objects in {} levels",
            compiled.objects.len(),
            levels.len()
        );
        Ok(Box::new(BatchedSimulator::new(compiled, levels)))
    }
}

fn matvec_dense(matrix: &Array2<f64>, x: &Array1<f64>, out: &mut Array1<f64>) {
    general_mat_vec_mul(1.0, matrix, x, 1.0, out);
}

/// Object indices grouped by dependency depth, ascending within a level
fn dependency_levels(compiled: &CompiledNetwork) -> Vec<Vec<usize>> {
    let mut depth = vec![0usize; compiled.objects.len()];
    let mut levels: Vec<Vec<usize>> = Vec::new();
    for (index, object) in compiled.objects.iter().enumerate() {
        let inputs = object.step_inputs();
        depth[index] = inputs.iter().map(|&i| depth[i] + 1).max().unwrap_or(0);
        if levels.len() <= depth[index] {
            levels.resize_with(depth[index] + 1, Vec::new);
        }
        levels[depth[index]].push(index);
    }
    levels
}

struct BatchedSimulator {
    compiled: CompiledNetwork,
    levels: Vec<Vec<usize>>,
    values: Vec<Array1<f64>>,
    recorder: Recorder,
    step_count: u64,
}

impl BatchedSimulator {
    fn new(compiled: CompiledNetwork, levels: Vec<Vec<usize>>) -> Self {
        let values = compiled.initial_values();
        let recorder = Recorder::new(&compiled);
        Self {
            compiled,
            levels,
            values,
            recorder,
            step_count: 0,
        }
    }
}

impl Simulator for BatchedSimulator {
    fn step(&mut self) -> RuntimeResult<()> {
        let t = (self.step_count + 1) as f64 * self.compiled.dt;
        for level in &self.levels {
            let compiled = &self.compiled;
            let values = &self.values;
            let outputs = level
                .par_iter()
                .map(|&index| compiled.evaluate(index, values, t, matvec_dense))
                .collect::<RuntimeResult<Vec<_>>>()?;
            for (&index, out) in level.iter().zip(outputs) {
                self.values[index] = out;
            }
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
