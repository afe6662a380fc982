// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Rate LIF Ensemble
//!
//! Approximates a vector function with a population of rate-based leaky
//! integrate-and-fire neurons and linear decoders.
//!
//! ```text
//! Encoding:
//!     J_i(x) = gain_i × (e_i · x / radius) + bias_i
//!
//! Steady-state firing rate:
//!     a(J) = 1 / (tau_ref + tau_rc × ln(1 + 1/(J − 1)))   for J > 1
//!     a(J) = 0                                             otherwise
//!
//! Decoding:
//!     f̂(x) = Σ_i a_i(x) × d_i
//! ```
//!
//! Decoders solve the ridge problem `(AᵀA + M·σ²·I) D = AᵀY` over `M`
//! evaluation points sampled uniformly from the ball of the given radius,
//! with `σ = 0.1 × max(A)`.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::error::{RuntimeError, RuntimeResult};
use crate::signal::{apply_checked, VectorFn};
use crate::target::NonlinearParams;

/// Membrane time constant (s)
pub const TAU_RC: f64 = 0.02;
/// Refractory period (s)
pub const TAU_REF: f64 = 0.002;
/// Number of evaluation points used to solve for decoders
pub const EVAL_POINTS: usize = 750;

const MAX_RATE_RANGE: (f64, f64) = (200.0, 400.0);
const INTERCEPT_RANGE: (f64, f64) = (-0.95, 0.95);
const NOISE_FRACTION: f64 = 0.1;

/// Steady-state firing rate for input current `j`
#[inline]
pub fn lif_rate(j: f64) -> f64 {
    if j > 1.0 {
        1.0 / (TAU_REF + TAU_RC * (1.0 / (j - 1.0)).ln_1p())
    } else {
        0.0
    }
}

/// Compiled ensemble: encoders, gains and biases, and decoders
#[derive(Debug, Clone)]
pub struct LifEnsemble {
    radius: f64,
    /// `n_neurons × size_in`, unit rows
    encoders: Array2<f64>,
    gain: Array1<f64>,
    bias: Array1<f64>,
    /// `n_neurons × size_out`
    decoders: Array2<f64>,
}

impl LifEnsemble {
    /// Sample neuron parameters and solve for decoders of `function`
    ///
    /// `object` is mixed into the seed so that ensembles sharing a seed still
    /// get distinct neurons, and is used for error reporting.
    pub fn build(
        function: &VectorFn,
        size_in: usize,
        size_out: usize,
        params: &NonlinearParams,
        object: usize,
    ) -> RuntimeResult<Self> {
        let n = params.n_neurons;
        if n == 0 || size_in == 0 {
            return Err(RuntimeError::InvalidParameters(format!(
                "ensemble for object {} needs neurons and a non-empty input",
                object
            )));
        }

        let mut rng = StdRng::seed_from_u64(mix_seed(params.seed, object));

        let mut encoders = Array2::zeros((n, size_in));
        for mut row in encoders.rows_mut() {
            row.assign(&unit_vector(&mut rng, size_in));
        }

        let mut gain = Array1::zeros(n);
        let mut bias = Array1::zeros(n);
        for i in 0..n {
            let max_rate = rng.gen_range(MAX_RATE_RANGE.0..MAX_RATE_RANGE.1);
            let intercept = rng.gen_range(INTERCEPT_RANGE.0..INTERCEPT_RANGE.1);
            let z = (1.0 / max_rate - TAU_REF) / TAU_RC;
            let j_max = 1.0 + 1.0 / z.exp_m1();
            gain[i] = (j_max - 1.0) / (1.0 - intercept);
            bias[i] = 1.0 - gain[i] * intercept;
        }

        let mut points = Array2::zeros((EVAL_POINTS, size_in));
        for mut row in points.rows_mut() {
            let scale = rng.gen::<f64>().powf(1.0 / size_in as f64);
            row.assign(&(unit_vector(&mut rng, size_in) * scale));
        }

        let mut targets = Array2::zeros((EVAL_POINTS, size_out));
        for (point, mut target) in points.rows().into_iter().zip(targets.rows_mut()) {
            let x: Vec<f64> = point.iter().map(|p| p * params.radius).collect();
            let y = apply_checked(function, &x, size_out, object)?;
            target.assign(&Array1::from(y));
        }

        let mut ensemble = Self {
            radius: params.radius,
            encoders,
            gain,
            bias,
            decoders: Array2::zeros((n, size_out)),
        };
        let activities = ensemble.activities_unit(&points);
        ensemble.decoders = solve_decoders(&activities, &targets).ok_or_else(|| {
            RuntimeError::SimulationFailed(format!(
                "decoder solve failed for object {}: no neuron is active \
                 over the evaluation points",
                object
            ))
        })?;
        Ok(ensemble)
    }

    pub fn n_neurons(&self) -> usize {
        self.gain.len()
    }

    pub fn size_out(&self) -> usize {
        self.decoders.ncols()
    }

    /// Firing rates for one input vector in represented units
    pub fn rates(&self, x: &Array1<f64>) -> Array1<f64> {
        let p = x / self.radius;
        let currents = &self.encoders.dot(&p) * &self.gain + &self.bias;
        currents.mapv(lif_rate)
    }

    /// Decoded estimate of the function at `x`
    pub fn evaluate(&self, x: &Array1<f64>) -> Array1<f64> {
        self.decoders.t().dot(&self.rates(x))
    }

    /// Rates over rows of points given in unit-ball coordinates
    fn activities_unit(&self, points: &Array2<f64>) -> Array2<f64> {
        let currents = points.dot(&self.encoders.t()) * &self.gain + &self.bias;
        currents.mapv(lif_rate)
    }
}

fn mix_seed(seed: u64, object: usize) -> u64 {
    seed ^ (object as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Standard normal sample via Box-Muller
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn unit_vector(rng: &mut StdRng, dims: usize) -> Array1<f64> {
    loop {
        let v = Array1::from_shape_fn(dims, |_| gaussian(rng));
        let norm = v.dot(&v).sqrt();
        if norm > 1e-12 {
            return v / norm;
        }
    }
}

/// Regularized least squares; `None` when the system is not positive definite
fn solve_decoders(activities: &Array2<f64>, targets: &Array2<f64>) -> Option<Array2<f64>> {
    let m = activities.nrows() as f64;
    let max_rate = activities.iter().cloned().fold(0.0_f64, f64::max);
    if max_rate <= 0.0 {
        return None;
    }
    let sigma = NOISE_FRACTION * max_rate;

    let mut gram = activities.t().dot(activities);
    gram.diag_mut().mapv_inplace(|g| g + m * sigma * sigma);
    let rhs = activities.t().dot(targets);

    let lower = cholesky(&gram)?;
    let mut decoders = Array2::zeros(rhs.raw_dim());
    for (col, mut out) in rhs.axis_iter(Axis(1)).zip(decoders.axis_iter_mut(Axis(1))) {
        out.assign(&cholesky_solve(&lower, &col.to_owned()));
    }
    Some(decoders)
}

fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if !(diag > 0.0) {
            return None;
        }
        let ljj = diag.sqrt();
        l[[j, j]] = ljj;
        for i in (j + 1)..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / ljj;
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b`
fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[[i, k]] * z[k];
        }
        z[i] = s / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut s = z[i];
        for k in (i + 1)..n {
            s -= l[[k, i]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::NeuronType;
    use ndarray::array;
    use std::sync::Arc;

    fn params(n_neurons: usize, seed: u64) -> NonlinearParams {
        NonlinearParams {
            n_neurons,
            radius: 1.0,
            neuron_type: NeuronType::LifRate,
            seed,
        }
    }

    #[test]
    fn test_rate_threshold() {
        assert_eq!(lif_rate(0.5), 0.0);
        assert_eq!(lif_rate(1.0), 0.0);
        assert!(lif_rate(2.0) > 0.0);
        assert!(lif_rate(10.0) > lif_rate(2.0));
        assert!(lif_rate(1e9) < 1.0 / TAU_REF);
    }

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let x = cholesky_solve(&l, &array![2.0, 1.0]);
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-12);
        assert!((back[1] - 1.0).abs() < 1e-12);
        assert!(cholesky(&array![[0.0, 0.0], [0.0, 1.0]]).is_none());
    }

    #[test]
    fn test_identity_is_approximated() {
        let f: VectorFn = Arc::new(|x: &[f64]| x.to_vec());
        let ens = LifEnsemble::build(&f, 1, 1, &params(200, 3), 0).unwrap();
        assert_eq!(ens.n_neurons(), 200);
        for x in [-0.6, -0.2, 0.0, 0.3, 0.7] {
            let y = ens.evaluate(&array![x]);
            assert!((y[0] - x).abs() < 0.1, "f({}) = {}", x, y[0]);
        }
    }

    #[test]
    fn test_same_seed_same_ensemble() {
        let f: VectorFn = Arc::new(|x: &[f64]| vec![x[0] * x[1]]);
        let a = LifEnsemble::build(&f, 2, 1, &params(50, 9), 4).unwrap();
        let b = LifEnsemble::build(&f, 2, 1, &params(50, 9), 4).unwrap();
        let x = array![0.3, -0.4];
        assert_eq!(a.evaluate(&x), b.evaluate(&x));
    }

    #[test]
    fn test_wrong_output_length_reported() {
        let f: VectorFn = Arc::new(|_x: &[f64]| vec![0.0, 0.0]);
        let err = LifEnsemble::build(&f, 1, 1, &params(10, 0), 2).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidOutput {
                object: 2,
                expected: 1,
                actual: 2
            }
        );
    }
}
