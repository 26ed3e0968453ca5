//! Error types shared across the crate.

use thiserror::Error;

use crate::nn::Activation;

/// Result alias used by every fallible operation in `deepnet`.
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors surfaced by tensors, layers, graphs and persistence.
///
/// The first four variants are contract violations detected before any GPU
/// work is issued. The rest wrap failures of the device or the filesystem.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Layer index {index} out of range for graph of {len} layers")]
    InvalidIndex { index: usize, len: usize },

    #[error("Graph has no layers")]
    NotReady,

    #[error("Kernel bound for {bound:?} but layer activation is {requested:?}")]
    PipelineMismatch {
        bound: Activation,
        requested: Activation,
    },

    #[error("Tensor of {bytes} bytes exceeds the device binding limit of {limit} bytes")]
    BufferTooLarge { bytes: u64, limit: u64 },

    #[error("Dispatch {workgroups:?} exceeds the limit of {limit} workgroups per axis")]
    DispatchTooLarge {
        workgroups: (u32, u32, u32),
        limit: u32,
    },

    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Failed to map buffer for readback: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackChannel,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parameter not found: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter file: {0}")]
    InvalidFormat(String),
}

impl NetError {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        NetError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
