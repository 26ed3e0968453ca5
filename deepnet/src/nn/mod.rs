//! Neural Network Module
//!
//! Layers and the feed-forward graph that chains them.

mod activation;
mod dense;
mod graph;
mod init;
mod layer;

pub use activation::{Activation, TANH_CLAMP};
pub use dense::{FullyConnected, FullyConnectedBuilder};
pub use graph::DeepNet;
pub use init::{ConstantInit, Initializer, UniformInit};
pub use layer::{Invalidated, Layer, LayerId};
