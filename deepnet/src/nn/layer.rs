//! Layer Trait
//!
//! The capability set every stage of a [`DeepNet`](super::DeepNet) provides.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::KernelKey;
use crate::config::DenseConfig;
use crate::error::Result;
use crate::nn::Activation;
use crate::tensor::Tensor;
use crate::Device;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique layer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn next() -> Self {
        LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which learned parameters a resize threw away and re-randomized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Invalidated {
    pub weights: bool,
    pub bias: bool,
}

impl Invalidated {
    pub const NONE: Invalidated = Invalidated {
        weights: false,
        bias: false,
    };
    pub const WEIGHTS: Invalidated = Invalidated {
        weights: true,
        bias: false,
    };
    pub const ALL: Invalidated = Invalidated {
        weights: true,
        bias: true,
    };

    pub fn any(&self) -> bool {
        self.weights || self.bias
    }
}

/// One affine + activation stage of a feed-forward network.
///
/// A layer exclusively owns its `weights [input, output]`, `bias [1, output]`
/// and `output [batch, output]` tensors. Resizing is always explicit: each
/// `resize_*` method reallocates what the new shape requires and reports in
/// its [`Invalidated`] result which learned parameters were re-randomized.
/// Resizing to the current size does nothing.
///
/// # Training
///
/// Inference only. The learning rate and momentum carried by layers are
/// reserved for a future training extension, which would add its own
/// backward and update operations alongside this trait rather than inside it.
pub trait Layer: Send + std::fmt::Debug {
    fn id(&self) -> LayerId;

    fn name(&self) -> &str;

    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    fn batch_size(&self) -> usize;

    fn activation(&self) -> Activation;

    /// The compiled kernel this layer dispatches.
    fn kernel(&self) -> KernelKey;

    fn device(&self) -> &Device;

    /// Compute `output = activation(input * weights + bias)`.
    ///
    /// `input` must be `[batch, input]`. Blocks until the device is done, so
    /// [`Layer::output`] is readable on return.
    fn forward(&mut self, input: &Tensor) -> Result<()>;

    /// Result of the most recent [`Layer::forward`].
    fn output(&self) -> &Tensor;

    /// Reallocates and re-randomizes the weights.
    fn resize_input(&mut self, input_size: usize) -> Result<Invalidated>;

    /// Reallocates the output only.
    fn resize_batch(&mut self, batch_size: usize) -> Result<Invalidated>;

    /// Reallocates weights, bias and output; re-randomizes weights and bias.
    fn resize_output(&mut self, output_size: usize) -> Result<Invalidated>;

    /// Learned tensors by name, for persistence.
    fn named_parameters(&self) -> Vec<(&'static str, &Tensor)>;

    /// Overwrite one learned tensor by name.
    fn load_parameter(&mut self, name: &str, data: &[f32]) -> Result<()>;

    /// Description sufficient to rebuild this layer's shape and settings.
    fn config(&self) -> DenseConfig;
}
