//! GPU Backend Module
//!
//! Kernel source, pipeline compilation and dispatch-grid arithmetic for the
//! dense layer kernel.

mod compute;
mod kernels;

pub use compute::{ComputeEngine, Dims, DispatchGrid, KernelKey, KernelVariant, GROUP_WIDTH};
pub(crate) use kernels::KERNELS_WGSL;
