// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Function and signal types shared between graph construction and simulation

use std::fmt;
use std::sync::Arc;

use crate::error::{RuntimeError, RuntimeResult};

/// Vector-to-vector function approximated by nonlinear objects
pub type VectorFn = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// Time-varying source function, evaluated at simulation time `t`
pub type TimeFn = Arc<dyn Fn(f64) -> Vec<f64> + Send + Sync>;

/// Value produced by a source object
#[derive(Clone)]
pub enum Signal {
    /// Same vector at every step
    Constant(Vec<f64>),
    /// `function(t)`, which must always return `size` values
    Function { size: usize, function: TimeFn },
}

impl Signal {
    /// Constant scalar source
    pub fn scalar(value: f64) -> Self {
        Signal::Constant(vec![value])
    }

    /// Time function producing `size` values
    pub fn function<F>(size: usize, function: F) -> Self
    where
        F: Fn(f64) -> Vec<f64> + Send + Sync + 'static,
    {
        Signal::Function {
            size,
            function: Arc::new(function),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Signal::Constant(values) => values.len(),
            Signal::Function { size, .. } => *size,
        }
    }

    /// Evaluate at time `t`; `object` is only used for error reporting
    pub fn sample(&self, t: f64, object: usize) -> RuntimeResult<Vec<f64>> {
        match self {
            Signal::Constant(values) => Ok(values.clone()),
            Signal::Function { size, function } => {
                let values = function(t);
                if values.len() != *size {
                    return Err(RuntimeError::InvalidOutput {
                        object,
                        expected: *size,
                        actual: values.len(),
                    });
                }
                Ok(values)
            }
        }
    }
}

impl From<Vec<f64>> for Signal {
    fn from(values: Vec<f64>) -> Self {
        Signal::Constant(values)
    }
}

impl From<f64> for Signal {
    fn from(value: f64) -> Self {
        Signal::scalar(value)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Constant(values) => f.debug_tuple("Constant").field(values).finish(),
            Signal::Function { size, .. } => f
                .debug_struct("Function")
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Apply `function` and check the produced length
pub(crate) fn apply_checked(
    function: &VectorFn,
    input: &[f64],
    expected: usize,
    object: usize,
) -> RuntimeResult<Vec<f64>> {
    let out = function(input);
    if out.len() != expected {
        return Err(RuntimeError::InvalidOutput {
            object,
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_signal_length_checked() {
        let signal = Signal::function(2, |t| vec![t]);
        assert_eq!(
            signal.sample(0.5, 3),
            Err(RuntimeError::InvalidOutput {
                object: 3,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_constant_signal() {
        let signal = Signal::Constant(vec![1.0, -1.0]);
        assert_eq!(signal.size(), 2);
        assert_eq!(signal.sample(10.0, 0).unwrap(), vec![1.0, -1.0]);
    }
}
