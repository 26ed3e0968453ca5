//! Tensor Module
//!
//! Padded GPU matrix storage and the shape arithmetic behind it.

mod core;
mod shape;

pub use self::core::Tensor;
pub use shape::{pad_host, pad_to_tile, unpad_host, Shape, TILE};
