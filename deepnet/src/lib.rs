//! # deepnet - GPU Feed-Forward Inference
//!
//! `deepnet` runs dense feed-forward networks on the GPU through wgpu.
//!
//! ## Features
//!
//! - **Tile-padded tensors**: every matrix is stored with both dimensions
//!   rounded up to a multiple of 8, so kernels work on whole 8x8 tiles
//! - **One dispatch per layer**: `activation(input * weights + bias)` in a
//!   single compute pass, with identity, tanh, sigmoid and ReLU kernels
//! - **Explicit shape propagation**: resizing a graph or inserting a layer
//!   reports exactly which learned parameters were re-randomized
//! - **Persistence**: save and load whole networks with their config
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deepnet::prelude::*;
//!
//! let device = Device::new()?;
//!
//! let config = NetConfig {
//!     input_size: 784,
//!     batch_size: 8,
//!     kernel: KernelVariant::Checked,
//!     layers: vec![
//!         DenseConfig::new(256, Activation::Relu),
//!         DenseConfig::new(10, Activation::Sigmoid),
//!     ],
//! };
//! let mut net = DeepNet::from_config(&device, &config)?;
//!
//! let scores = net.forward(&vec![0.5; 784 * 8])?;
//! assert_eq!(scores.len(), 10 * 8);
//! # Ok::<(), deepnet::NetError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod nn;
pub mod serialize;
pub mod tensor;

mod device;

pub use device::Device;
pub use error::{NetError, Result};

/// Prelude module - import everything you need with `use deepnet::prelude::*`
pub mod prelude {
    pub use crate::backend::KernelVariant;
    pub use crate::config::{DenseConfig, DeviceConfig, NetConfig};
    pub use crate::nn::{
        Activation, ConstantInit, DeepNet, FullyConnected, Initializer, Invalidated, Layer,
        TANH_CLAMP, UniformInit,
    };
    pub use crate::serialize::{load_net, save_net};
    pub use crate::tensor::{Shape, Tensor};
    pub use crate::Device;
    pub use crate::NetError;
}
