// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Builtin element kinds

use gyrus_runtime::{Handle, NeuronType, NonlinearParams, Signal, Target, VectorFn};
use ndarray::Array2;

use crate::config::ResolvedConfig;
use crate::error::{ConfigurationError, GraphError, GraphResult, MakeResult};
use crate::vectorize::ElementBuilder;

fn single_input(kind: &str, sizes_in: &[usize]) -> GraphResult<usize> {
    match sizes_in {
        [size] => Ok(*size),
        _ => Err(GraphError::invalid(format!(
            "{} takes exactly one input, got {}",
            kind,
            sizes_in.len()
        ))),
    }
}

/// Constant or time-varying leaf
pub(crate) struct StimulusElement {
    pub signal: Signal,
}

impl ElementBuilder for StimulusElement {
    fn name(&self) -> &str {
        "stimulus"
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        if !sizes_in.is_empty() {
            return Err(GraphError::invalid("stimulus takes no inputs"));
        }
        Ok(self.signal.size())
    }

    fn build(
        &self,
        target: &mut dyn Target,
        _inputs: &[Handle],
        _config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        Ok(target.create_source(self.signal.clone())?)
    }
}

/// `Σ matrices[i] · inputs[i]`
pub(crate) struct TransformElement {
    pub matrices: Vec<Array2<f64>>,
}

impl ElementBuilder for TransformElement {
    fn name(&self) -> &str {
        "transform"
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        if sizes_in.len() != self.matrices.len() || sizes_in.is_empty() {
            return Err(GraphError::invalid(format!(
                "transform has {} matrices for {} inputs",
                self.matrices.len(),
                sizes_in.len()
            )));
        }
        let rows = self.matrices[0].nrows();
        for (matrix, &size) in self.matrices.iter().zip(sizes_in) {
            if matrix.ncols() != size {
                return Err(GraphError::size_mismatch("transform", matrix.ncols(), size));
            }
            if matrix.nrows() != rows {
                return Err(GraphError::size_mismatch("transform", rows, matrix.nrows()));
            }
        }
        Ok(rows)
    }

    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        _config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        Ok(target.create_linear(inputs, self.matrices.clone())?)
    }
}

/// Approximation of `function` by a nonlinear runtime object
pub(crate) struct DecodeElement {
    pub function: VectorFn,
    pub size_out: usize,
}

pub(crate) const DECODE_PARAMS: &[&str] = &["n_neurons", "radius", "neuron_type", "seed"];

impl ElementBuilder for DecodeElement {
    fn name(&self) -> &str {
        "decode"
    }

    fn configurable(&self) -> &[&'static str] {
        DECODE_PARAMS
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        single_input("decode", sizes_in)?;
        Ok(self.size_out)
    }

    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        let neuron_type = config.get_str("neuron_type")?;
        let params = NonlinearParams {
            n_neurons: config.get_usize("n_neurons")?,
            radius: config.get_f64("radius")?,
            neuron_type: neuron_type.parse::<NeuronType>().map_err(|_| {
                ConfigurationError::InvalidValue {
                    key: "neuron_type".to_string(),
                    expected: "\"direct\" or \"lif_rate\"".to_string(),
                    found: neuron_type.to_string(),
                }
            })?,
            seed: config.get_usize("seed")? as u64,
        };
        Ok(target.create_nonlinear(inputs[0], self.function.clone(), self.size_out, params)?)
    }
}

/// Selection of output dimensions
pub(crate) struct SliceElement {
    pub indices: Vec<usize>,
}

impl ElementBuilder for SliceElement {
    fn name(&self) -> &str {
        "slice"
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        let size = single_input("slice", sizes_in)?;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= size) {
            return Err(GraphError::invalid(format!(
                "slice index {} out of range for size {}",
                bad, size
            )));
        }
        Ok(self.indices.len())
    }

    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        _config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        let input = inputs[0];
        if target.supports_partial_connection() {
            return Ok(target.create_slice(input, &self.indices)?);
        }
        let mut selection = Array2::zeros((self.indices.len(), input.size()));
        for (row, &col) in self.indices.iter().enumerate() {
            selection[[row, col]] = 1.0;
        }
        Ok(target.create_linear(&[input], vec![selection])?)
    }
}

/// Concatenation of input outputs
pub(crate) struct BundleElement;

impl ElementBuilder for BundleElement {
    fn name(&self) -> &str {
        "bundle"
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        if sizes_in.is_empty() {
            return Err(GraphError::invalid("bundle needs at least one input"));
        }
        Ok(sizes_in.iter().sum())
    }

    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        _config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        let total: usize = inputs.iter().map(Handle::size).sum();
        let mut offset = 0;
        let mut blocks = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut block = Array2::zeros((total, input.size()));
            for j in 0..input.size() {
                block[[offset + j, j]] = 1.0;
            }
            offset += input.size();
            blocks.push(block);
        }
        Ok(target.create_linear(inputs, blocks)?)
    }
}

/// First-order lowpass with time constant `synapse`
pub(crate) struct FilterElement;

impl ElementBuilder for FilterElement {
    fn name(&self) -> &str {
        "filter"
    }

    fn configurable(&self) -> &[&'static str] {
        &["synapse"]
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        single_input("filter", sizes_in)
    }

    fn build(
        &self,
        target: &mut dyn Target,
        inputs: &[Handle],
        config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        let tau = config.get_f64("synapse")?;
        Ok(target.create_filter(inputs[0], tau)?)
    }
}

/// Pass-through carrying a configuration overlay
pub(crate) struct ConfigureElement;

impl ElementBuilder for ConfigureElement {
    fn name(&self) -> &str {
        "configure"
    }

    fn size_out(&self, sizes_in: &[usize]) -> GraphResult<usize> {
        single_input("configure", sizes_in)
    }

    fn build(
        &self,
        _target: &mut dyn Target,
        inputs: &[Handle],
        _config: &ResolvedConfig,
    ) -> MakeResult<Handle> {
        Ok(inputs[0])
    }
}
