//! Tensor Storage Tests
//!
//! Padding, round trips and shape checks against a real device.

mod common;

#[cfg(test)]
mod tests {
    use super::common;
    use deepnet::prelude::*;

    #[test]
    fn test_unaligned_round_trip() {
        let Some(device) = common::device() else {
            return;
        };
        let data = common::wave(3 * 5, 0.0, 1.0);
        let t = Tensor::from_data(&device, &data, Shape::new(3, 5)).unwrap();

        assert_eq!(t.shape(), Shape::new(3, 5));
        assert_eq!(t.padded_shape(), Shape::new(8, 8));
        assert_eq!(t.size_in_bytes(), 8 * 8 * 4);
        assert_eq!(t.read().unwrap(), data);
    }

    #[test]
    fn test_aligned_round_trip() {
        let Some(device) = common::device() else {
            return;
        };
        let data = common::wave(8 * 16, 1.0, 3.0);
        let t = Tensor::from_data(&device, &data, Shape::new(8, 16)).unwrap();

        assert_eq!(t.padded_shape(), t.shape());
        assert_eq!(t.read().unwrap(), data);
        assert_eq!(t.read_padded().unwrap(), data);
    }

    #[test]
    fn test_padding_is_zero_after_write() {
        let Some(device) = common::device() else {
            return;
        };
        let mut t = Tensor::zeros(&device, Shape::new(2, 3)).unwrap();
        assert!(t.read_padded().unwrap().iter().all(|&v| v == 0.0));

        t.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let image = t.read_padded().unwrap();
        assert_eq!(image.len(), 64);
        for row in 0..8 {
            for col in 0..8 {
                let v = image[row * 8 + col];
                if row < 2 && col < 3 {
                    assert_eq!(v, (row * 3 + col + 1) as f32);
                } else {
                    assert_eq!(v, 0.0, "pad cell ({}, {}) not zero", row, col);
                }
            }
        }
    }

    #[test]
    fn test_vector_is_row() {
        let Some(device) = common::device() else {
            return;
        };
        let t = Tensor::from_data(&device, &[1.0; 9], Shape::vector(9)).unwrap();
        assert_eq!(t.shape(), Shape::new(1, 9));
        assert_eq!(t.padded_shape(), Shape::new(8, 16));
        assert_eq!(t.read().unwrap(), vec![1.0; 9]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let Some(device) = common::device() else {
            return;
        };
        let err = Tensor::from_data(&device, &[1.0; 5], Shape::new(2, 3)).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));

        let mut t = Tensor::zeros(&device, Shape::new(2, 3)).unwrap();
        t.write(&[7.0; 6]).unwrap();
        assert!(matches!(
            t.write(&[1.0; 7]),
            Err(NetError::ShapeMismatch { .. })
        ));
        // The failed write left the contents alone.
        assert_eq!(t.read().unwrap(), vec![7.0; 6]);
    }

    #[test]
    fn test_empty_shape_rejected() {
        let Some(device) = common::device() else {
            return;
        };
        assert!(Tensor::zeros(&device, Shape::new(0, 4)).is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let Some(device) = common::device() else {
            return;
        };
        let a = Tensor::zeros(&device, Shape::new(1, 1)).unwrap();
        let b = Tensor::zeros(&device, Shape::new(1, 1)).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
