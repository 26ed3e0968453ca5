//! Logical and padded matrix shapes.
//!
//! Every GPU buffer is allocated with both dimensions rounded up to a
//! multiple of [`TILE`], so the dense kernel can process whole 8x8 tiles
//! without bounds checks in its inner loop.

use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Edge length of the square output tile one kernel invocation computes.
pub const TILE: usize = 8;

/// Round `n` up to the next multiple of [`TILE`].
pub fn pad_to_tile(n: usize) -> usize {
    n.next_multiple_of(TILE)
}

/// A row-major matrix shape of rank at most two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// A rank-1 shape `[n]`, stored as the row vector `[1, n]`.
    pub const fn vector(n: usize) -> Self {
        Self { rows: 1, cols: n }
    }

    /// Build from a dimension list of rank 1 or 2.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match *dims {
            [n] => Ok(Self::vector(n)),
            [rows, cols] => Ok(Self::new(rows, cols)),
            _ => Err(NetError::shape(
                "tensor rank",
                "rank 1 or 2",
                format!("{:?}", dims),
            )),
        }
    }

    pub fn dims(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The tile-aligned allocation shape.
    pub fn padded(&self) -> Self {
        Self {
            rows: pad_to_tile(self.rows),
            cols: pad_to_tile(self.cols),
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.padded() == *self
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.rows, self.cols)
    }
}

/// Lay `data` (logical, row-major) into a zero-filled padded image.
pub fn pad_host(data: &[f32], logical: Shape, padded: Shape) -> Vec<f32> {
    debug_assert_eq!(data.len(), logical.count());
    if logical == padded {
        return data.to_vec();
    }
    let mut image = vec![0.0f32; padded.count()];
    if logical.is_empty() {
        return image;
    }
    for (row, src) in data.chunks_exact(logical.cols).enumerate() {
        let start = row * padded.cols;
        image[start..start + logical.cols].copy_from_slice(src);
    }
    image
}

/// Extract the logical sub-rectangle from a padded image.
pub fn unpad_host(image: &[f32], logical: Shape, padded: Shape) -> Vec<f32> {
    debug_assert_eq!(image.len(), padded.count());
    if logical == padded {
        return image.to_vec();
    }
    let mut data = Vec::with_capacity(logical.count());
    if logical.is_empty() {
        return data;
    }
    for row in image.chunks_exact(padded.cols).take(logical.rows) {
        data.extend_from_slice(&row[..logical.cols]);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_each_dimension_to_tile() {
        for n in 0..=40 {
            let p = pad_to_tile(n);
            assert_eq!(p % TILE, 0);
            assert!(p >= n && p < n + TILE);
            if n % TILE == 0 {
                assert_eq!(p, n);
            }
        }
        assert_eq!(Shape::new(3, 10).padded(), Shape::new(8, 16));
        assert_eq!(Shape::new(8, 1000).padded(), Shape::new(8, 1000));
        assert_eq!(Shape::new(65536, 4096).padded(), Shape::new(65536, 4096));
        assert_eq!(Shape::new(9, 17).padded(), Shape::new(16, 24));
    }

    #[test]
    fn vector_is_a_single_row() {
        let s = Shape::from_dims(&[5]).unwrap();
        assert_eq!(s, Shape::new(1, 5));
        assert_eq!(s.padded(), Shape::new(8, 8));
        assert_eq!(s.count(), 5);
    }

    #[test]
    fn rejects_higher_rank() {
        let err = Shape::from_dims(&[2, 3, 4]).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));
        assert!(Shape::from_dims(&[]).is_err());
    }

    #[test]
    fn pad_then_unpad_is_identity() {
        let logical = Shape::new(3, 5);
        let padded = logical.padded();
        let data: Vec<f32> = (0..15).map(|i| i as f32 + 1.0).collect();

        let image = pad_host(&data, logical, padded);
        assert_eq!(image.len(), 64);
        assert_eq!(unpad_host(&image, logical, padded), data);
    }

    #[test]
    fn pad_cells_are_zero() {
        let logical = Shape::new(2, 3);
        let padded = logical.padded();
        let image = pad_host(&[1.0; 6], logical, padded);
        for row in 0..padded.rows {
            for col in 0..padded.cols {
                let v = image[row * padded.cols + col];
                if row < 2 && col < 3 {
                    assert_eq!(v, 1.0);
                } else {
                    assert_eq!(v, 0.0, "pad cell ({}, {}) not zero", row, col);
                }
            }
        }
    }

    #[test]
    fn aligned_shapes_take_the_fast_path() {
        let logical = Shape::new(8, 16);
        assert!(logical.is_aligned());
        let data: Vec<f32> = (0..128).map(|i| i as f32).collect();
        assert_eq!(pad_host(&data, logical, logical), data);
        assert_eq!(unpad_host(&data, logical, logical), data);
    }
}
