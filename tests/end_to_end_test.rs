// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Integration Tests: Configuration File to Simulation
//!
//! - Configuration file → build defaults and run options
//! - Graph construction → materialization → probing → simulation

use gyrus::prelude::*;
use gyrus::config::load_config;
use gyrus::graph::{probe, TimeAxis};
use ndarray::{arr1, array};
use std::f64::consts::PI;
use std::fs;
use tempfile::TempDir;

// ═══════════════════════════════════════════════════════════
// Helper Functions
// ═══════════════════════════════════════════════════════════

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("gyrus_configuration.toml");
    fs::write(&path, contents).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[test]
fn test_file_defaults_reach_decode_objects() {
    gyrus::observability::init_test_logging();

    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[simulation]
backend = "batched"
dt = 0.002
time_axis = "leading"

[defaults]
n_neurons = 64
neuron_type = "lif_rate"
seed = 3
"#,
    );
    let config = load_config(Some(&path), None).unwrap();
    let options = RunOptions::from_config(&config).unwrap();
    assert_eq!(options.backend, BackendType::Batched);
    assert_eq!(options.time_axis, TimeAxis::Leading);
    assert_eq!(options.dt, 0.002);

    let x = ops::stimulus(vec![0.3]).unwrap();
    let y = x.decode(|v: &[f64]| v.to_vec(), None).unwrap();

    let mut net = Network::new();
    let defaults = ConfigDefaults::from_config(&config.defaults);
    let handle = BuildContext::with_defaults(&mut net, defaults).make(&y).unwrap();
    match net.object(handle).unwrap() {
        gyrus::runtime::RuntimeObject::Nonlinear { params, .. } => {
            assert_eq!(params.n_neurons, 64);
            assert_eq!(params.seed, 3);
            assert_eq!(params.neuron_type, gyrus::runtime::NeuronType::LifRate);
            // unset keys keep their builtin default
            assert_eq!(params.radius, 1.0);
        }
        other => panic!("expected a nonlinear object, got {:?}", other),
    }
}

#[test]
fn test_oscillator_pipeline_on_both_backends() {
    let omega = 2.0 * PI;
    let a = array![[0.0, -omega], [omega, 0.0]];
    let kick = ops::stimulus_fn(2, |t| {
        if t < 0.0015 {
            vec![1000.0, 0.0]
        } else {
            vec![0.0, 0.0]
        }
    })
    .unwrap();
    let state = kick.lti(&a, &ndarray::Array2::eye(2)).unwrap();
    let fold = Fold::from_node(state);

    let options = RunOptions::default().with_duration(1.0).with_dt(0.001);
    let cpu = run(&fold, &options.clone().with_backend(BackendType::Cpu)).unwrap();
    let batched = run(&fold, &options.with_backend(BackendType::Batched)).unwrap();
    assert_eq!(cpu.shape(), &[1000, 2]);
    for (x, y) in cpu.iter().zip(batched.iter()) {
        assert!((x - y).abs() < 1e-9);
    }
    // a quarter period in, the state has rotated onto the second axis
    assert!(cpu[[250, 1]] > 0.9, "x2(0.25) = {}", cpu[[250, 1]]);
}

#[test]
fn test_manual_probe_of_unbundled_outputs() {
    let fold = ops::stimuli(&arr1(&[1.0, 2.0, 3.0]).into_dyn()).unwrap();
    let bundled = fold.bundle(0).unwrap();
    let split = bundled.unbundle(0).unwrap().multiply(10.0).unwrap();

    let mut net = Network::new();
    let handles = BuildContext::new(&mut net).make_fold(&split).unwrap();
    let capture = probe(&mut net, &handles).unwrap();
    let data = create_backend(BackendType::Cpu).simulate(&net, 2.0, 1.0).unwrap();
    let dense = capture.extract_dense(&data, TimeAxis::Trailing).unwrap();
    assert_eq!(dense.shape(), &[3, 2, 1]);
    assert_eq!(dense[[2, 1, 0]], 30.0);
}
