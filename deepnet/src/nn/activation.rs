//! Activation Functions
//!
//! Each activation has its own compiled dense kernel entry point.

use serde::{Deserialize, Serialize};

/// Pre-activation bound applied before `tanh` on the GPU.
pub const TANH_CLAMP: f32 = 15.0;

/// Elementwise non-linearity applied after the affine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    #[default]
    Tanh,
    Sigmoid,
    Relu,
}

impl Activation {
    pub const ALL: [Activation; 4] = [
        Activation::Identity,
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Relu,
    ];

    /// Short lowercase name used in kernel entry points and config files.
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Relu => "relu",
        }
    }

    /// Host reference of what the kernel computes for one element.
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Tanh => x.clamp(-TANH_CLAMP, TANH_CLAMP).tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
        }
    }

    /// Half-width of the uniform distribution used for fresh weights.
    ///
    /// Glorot for the saturating functions (scaled by 4 for sigmoid), He for
    /// ReLU.
    pub fn init_limit(&self, fan_in: usize, fan_out: usize) -> f32 {
        let glorot = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
        match self {
            Activation::Identity | Activation::Tanh => glorot,
            Activation::Sigmoid => 4.0 * glorot,
            Activation::Relu => (6.0 / fan_in.max(1) as f32).sqrt(),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tanh_clamps_large_inputs() {
        assert_eq!(Activation::Tanh.apply(1e6), 15.0f32.tanh());
        assert_eq!(Activation::Tanh.apply(-1e6), (-15.0f32).tanh());
        assert!(Activation::Tanh.apply(f32::MAX).is_finite());
    }

    #[test]
    fn tanh_limit_is_glorot() {
        let limit = Activation::Tanh.init_limit(300, 100);
        assert!((limit - (6.0f32 / 400.0).sqrt()).abs() < 1e-7);
    }

    #[test]
    fn relu_limit_uses_fan_in_only() {
        assert_eq!(
            Activation::Relu.init_limit(24, 1),
            Activation::Relu.init_limit(24, 1000)
        );
    }

    #[test]
    fn reference_values() {
        assert_eq!(Activation::Identity.apply(-3.5), -3.5);
        assert_eq!(Activation::Relu.apply(-3.5), 0.0);
        assert_eq!(Activation::Relu.apply(2.0), 2.0);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-7);
    }
}
