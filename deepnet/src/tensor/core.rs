//! Core Tensor Implementation
//!
//! A `Tensor` is a single-owner GPU buffer holding a tile-padded, row-major
//! f32 matrix together with its logical shape.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferUsages};

use super::shape::{pad_host, unpad_host, Shape};
use crate::error::{NetError, Result};
use crate::Device;

static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(1);

/// A rank-2 f32 matrix stored on the GPU with zeroed tile padding.
///
/// The buffer is released exactly once, when the tensor is dropped. Tensors
/// are deliberately not `Clone`.
///
/// # Example
/// ```rust,no_run
/// use deepnet::prelude::*;
///
/// let device = Device::new()?;
/// let mut t = Tensor::new(&device, Shape::new(2, 3), None)?;
/// t.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
/// assert_eq!(t.read()?, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// assert_eq!(t.padded_shape(), Shape::new(8, 8));
/// # Ok::<(), deepnet::NetError>(())
/// ```
pub struct Tensor {
    id: u64,
    buffer: Buffer,
    logical: Shape,
    padded: Shape,
    device: Device,
}

impl Tensor {
    // ========================================================================
    // CREATION
    // ========================================================================

    /// Allocate a padded buffer for `shape`, filled from `data` if given and
    /// zeroed otherwise.
    pub fn new(device: &Device, shape: Shape, data: Option<&[f32]>) -> Result<Self> {
        if shape.is_empty() {
            return Err(NetError::shape("tensor shape", "non-empty", shape));
        }
        if let Some(data) = data {
            if data.len() != shape.count() {
                return Err(NetError::shape(
                    "tensor data",
                    format!("{} elements for {}", shape.count(), shape),
                    data.len(),
                ));
            }
        }

        let padded = shape.padded();
        let bytes = (padded.count() * std::mem::size_of::<f32>()) as u64;
        let limit = device.max_binding_size();
        if bytes > limit {
            return Err(NetError::BufferTooLarge { bytes, limit });
        }

        let image = match data {
            Some(data) => pad_host(data, shape, padded),
            None => vec![0.0f32; padded.count()],
        };
        let buffer = device
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Tensor Buffer"),
                contents: bytemuck::cast_slice(&image),
                usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            });

        Ok(Self {
            id: NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed),
            buffer,
            logical: shape,
            padded,
            device: device.clone(),
        })
    }

    /// Create a zero-filled tensor.
    pub fn zeros(device: &Device, shape: Shape) -> Result<Self> {
        Self::new(device, shape, None)
    }

    /// Create a tensor from row-major data.
    pub fn from_data(device: &Device, data: &[f32], shape: Shape) -> Result<Self> {
        Self::new(device, shape, Some(data))
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    /// Process-unique identity; a reallocated tensor gets a new one.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shape(&self) -> Shape {
        self.logical
    }

    pub fn padded_shape(&self) -> Shape {
        self.padded
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.logical.count()
    }

    pub fn size_in_bytes(&self) -> u64 {
        (self.padded.count() * std::mem::size_of::<f32>()) as u64
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    // ========================================================================
    // DATA ACCESS
    // ========================================================================

    /// Overwrite the logical contents. Pad cells are rewritten as zero.
    pub fn write(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.numel() {
            return Err(NetError::shape(
                "tensor write",
                format!("{} elements for {}", self.numel(), self.logical),
                data.len(),
            ));
        }
        let image = pad_host(data, self.logical, self.padded);
        self.device
            .queue
            .write_buffer(&self.buffer, 0, bytemuck::cast_slice(&image));
        Ok(())
    }

    /// Copy the logical sub-rectangle back to the host.
    pub fn read(&self) -> Result<Vec<f32>> {
        let image = self.read_padded()?;
        Ok(unpad_host(&image, self.logical, self.padded))
    }

    /// Copy the whole padded buffer back to the host, pad cells included.
    pub fn read_padded(&self) -> Result<Vec<f32>> {
        let size = self.size_in_bytes();
        let staging = self.device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.device
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Readback Encoder"),
                });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        self.device.submit_and_wait(encoder.finish());

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.wait_idle();
        rx.recv().map_err(|_| NetError::ReadbackChannel)??;

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("shape", &self.logical)
            .field("padded", &self.padded)
            .finish()
    }
}
