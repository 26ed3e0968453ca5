//! Weight initialization
//!
//! Layers call an [`Initializer`] every time a resize changes the shape of
//! their weights or bias. The default draws from a uniform distribution whose
//! width depends on the activation and the fan-in/fan-out.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

use super::Activation;

/// Source of fresh parameter values.
pub trait Initializer: Send + Sync {
    /// Produce `count` values for a parameter of a layer with the given
    /// activation and fan-in/fan-out.
    fn sample(&self, activation: Activation, fan_in: usize, fan_out: usize, count: usize)
        -> Vec<f32>;
}

/// Uniform in `±activation.init_limit(fan_in, fan_out)`.
pub struct UniformInit {
    rng: Mutex<StdRng>,
}

impl UniformInit {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic stream for reproducible networks.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for UniformInit {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer for UniformInit {
    fn sample(
        &self,
        activation: Activation,
        fan_in: usize,
        fan_out: usize,
        count: usize,
    ) -> Vec<f32> {
        let limit = activation.init_limit(fan_in, fan_out);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..count).map(|_| rng.gen_range(-limit..=limit)).collect()
    }
}

/// Every value set to the same constant.
#[derive(Debug, Clone, Copy)]
pub struct ConstantInit(pub f32);

impl Initializer for ConstantInit {
    fn sample(&self, _: Activation, _: usize, _: usize, count: usize) -> Vec<f32> {
        vec![self.0; count]
    }
}

pub(crate) fn default_initializer() -> Arc<dyn Initializer> {
    Arc::new(UniformInit::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_within_limit() {
        let init = UniformInit::seeded(7);
        let limit = Activation::Tanh.init_limit(64, 32);
        let values = init.sample(Activation::Tanh, 64, 32, 10_000);
        assert_eq!(values.len(), 10_000);
        assert!(values.iter().all(|v| v.abs() <= limit));
        // Not degenerate.
        assert!(values.iter().any(|v| v.abs() > limit / 2.0));
    }

    #[test]
    fn seeded_streams_repeat() {
        let a = UniformInit::seeded(42).sample(Activation::Relu, 10, 10, 16);
        let b = UniformInit::seeded(42).sample(Activation::Relu, 10, 10, 16);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_fills() {
        assert_eq!(ConstantInit(0.25).sample(Activation::Tanh, 1, 1, 3), vec![0.25; 3]);
    }
}
