//! Shared helpers for GPU integration tests.

#![allow(dead_code)]

use deepnet::nn::Activation;
use deepnet::Device;

/// Acquire a device, or `None` when the machine has no usable adapter.
pub fn device() -> Option<Device> {
    let _ = env_logger::builder().is_test(true).try_init();
    match Device::new() {
        Ok(device) => Some(device),
        Err(err) => {
            log::warn!("Skipping GPU test: {}", err);
            None
        }
    }
}

/// Deterministic, non-trivial values in roughly `[-scale, scale]`.
pub fn wave(len: usize, phase: f32, scale: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 0.37 + phase).sin() * scale)
        .collect()
}

/// Host `activation(input [m, n] * weights [n, k] + bias [k])`.
pub fn dense_reference(
    input: &[f32],
    weights: &[f32],
    bias: &[f32],
    m: usize,
    n: usize,
    k: usize,
    activation: Activation,
) -> Vec<f32> {
    let mut out = vec![0.0; m * k];
    for row in 0..m {
        for col in 0..k {
            let mut acc = 0.0f32;
            for i in 0..n {
                acc += input[row * n + i] * weights[i * k + col];
            }
            out[row * k + col] = activation.apply(acc + bias[col]);
        }
    }
    out
}

pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length differs");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "element {}: got {}, expected {} (tol {})",
            i,
            a,
            e,
            tol
        );
    }
}
