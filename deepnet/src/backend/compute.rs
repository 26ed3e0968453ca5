//! Compute Engine - GPU Kernel Dispatch
//!
//! Compiles every dense kernel once per device and hands out pipelines keyed
//! by activation and bounds-checking variant.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use wgpu::{BindGroup, BindGroupLayout, Buffer, ComputePipeline, Device};

use super::KERNELS_WGSL;
use crate::nn::Activation;
use crate::tensor::{Shape, TILE};

/// Invocations per workgroup along x. Must match `@workgroup_size` in WGSL.
pub const GROUP_WIDTH: u32 = 64;

/// Whether the dense kernel guards writes against the logical output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelVariant {
    /// Never writes outside the logical rectangle; pad cells stay zero.
    #[default]
    Checked,
    /// Writes whole tiles, including pad cells of the output.
    Unchecked,
}

/// Identifies one compiled dense pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub activation: Activation,
    pub variant: KernelVariant,
}

impl KernelKey {
    pub fn new(activation: Activation, variant: KernelVariant) -> Self {
        Self {
            activation,
            variant,
        }
    }

    /// WGSL entry point name, e.g. `dense_tanh` or `dense_relu_unchecked`.
    pub fn entry_point(&self) -> String {
        match self.variant {
            KernelVariant::Checked => format!("dense_{}", self.activation.name()),
            KernelVariant::Unchecked => format!("dense_{}_unchecked", self.activation.name()),
        }
    }
}

/// Uniform record bound at slot 4 (must match the WGSL `Dims` struct).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Dims {
    pub m: u32,
    pub k: u32,
    pub n: u32,
    pub pbytes: u32,
    pub qbytes: u32,
    pub _pad: [u32; 3],
}

impl Dims {
    /// Dimensions for `input [m, n] x weights [n, k]`.
    pub fn dense(input: Shape, input_padded: Shape, weights: Shape, weights_padded: Shape) -> Self {
        Self {
            m: input.rows as u32,
            k: weights.cols as u32,
            n: input.cols as u32,
            pbytes: (input_padded.cols * std::mem::size_of::<f32>()) as u32,
            qbytes: (weights_padded.cols * std::mem::size_of::<f32>()) as u32,
            _pad: [0; 3],
        }
    }
}

/// Workgroup counts for one dense dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    /// Output tiles along the column (node) axis.
    pub tiles_x: u32,
    /// Output tiles along the row (batch) axis.
    pub tiles_y: u32,
    pub workgroups: (u32, u32, u32),
}

impl DispatchGrid {
    /// One invocation per 8x8 tile of the padded output. Groups are
    /// `GROUP_WIDTH` wide and one tall since node counts dwarf batch sizes.
    pub fn dense(input_padded: Shape, weights_padded: Shape) -> Self {
        let tiles_x = weights_padded.cols.div_ceil(TILE) as u32;
        let tiles_y = input_padded.rows.div_ceil(TILE) as u32;
        Self {
            tiles_x,
            tiles_y,
            workgroups: (tiles_x.div_ceil(GROUP_WIDTH), tiles_y, 1),
        }
    }

    /// Whether every axis stays within `limit` workgroups.
    pub fn fits(&self, limit: u32) -> bool {
        let (x, y, z) = self.workgroups;
        x <= limit && y <= limit && z <= limit
    }
}

/// GPU Compute Engine for kernel dispatch
pub struct ComputeEngine {
    dense_layout: BindGroupLayout,
    pipelines: HashMap<KernelKey, ComputePipeline>,
}

impl ComputeEngine {
    /// Create a new compute engine with all kernels compiled.
    pub fn new(device: &Device) -> Self {
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Dense Kernels"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(KERNELS_WGSL)),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let dense_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Dense Layout"),
            entries: &[
                storage(0, true),
                storage(1, true),
                storage(2, true),
                storage(3, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<Dims>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dense Pipeline Layout"),
            bind_group_layouts: &[&dense_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for activation in Activation::ALL {
            for variant in [KernelVariant::Checked, KernelVariant::Unchecked] {
                let key = KernelKey::new(activation, variant);
                let name = key.entry_point();
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(name.as_str()),
                    layout: Some(&pipeline_layout),
                    module: &shader_module,
                    entry_point: &name,
                    compilation_options: Default::default(),
                    cache: None,
                });
                pipelines.insert(key, pipeline);
            }
        }
        log::info!("Compiled {} dense pipelines", pipelines.len());

        Self {
            dense_layout,
            pipelines,
        }
    }

    /// Get a compute pipeline by key.
    pub fn pipeline(&self, key: KernelKey) -> Option<&ComputePipeline> {
        self.pipelines.get(&key)
    }

    /// Bind the five dense buffers in ABI order.
    pub fn dense_bind_group(
        &self,
        device: &Device,
        input: &Buffer,
        weights: &Buffer,
        bias: &Buffer,
        output: &Buffer,
        dims: &Buffer,
    ) -> BindGroup {
        let buffers = [input, weights, bias, output, dims];
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Dense Bind Group"),
            layout: &self.dense_layout,
            entries: &entries,
        })
    }

    /// Record one dense dispatch into `encoder`.
    pub fn encode_dense(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &ComputePipeline,
        bind_group: &BindGroup,
        grid: DispatchGrid,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Dense Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        let (x, y, z) = grid.workgroups;
        pass.dispatch_workgroups(x, y, z);
    }
}

impl std::fmt::Debug for ComputeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeEngine")
            .field("num_pipelines", &self.pipelines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_names() {
        let key = KernelKey::new(Activation::Tanh, KernelVariant::Checked);
        assert_eq!(key.entry_point(), "dense_tanh");
        let key = KernelKey::new(Activation::Relu, KernelVariant::Unchecked);
        assert_eq!(key.entry_point(), "dense_relu_unchecked");
    }

    #[test]
    fn dims_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Dims>(), 32);
    }

    #[test]
    fn dims_use_padded_strides() {
        let input = Shape::new(3, 10);
        let weights = Shape::new(10, 5);
        let dims = Dims::dense(input, input.padded(), weights, weights.padded());
        assert_eq!((dims.m, dims.k, dims.n), (3, 5, 10));
        assert_eq!(dims.pbytes, 16 * 4);
        assert_eq!(dims.qbytes, 8 * 4);
    }

    #[test]
    fn grid_covers_padded_output_in_tiles() {
        // batch 8 x 4096 nodes: 512 column tiles, one row tile.
        let grid = DispatchGrid::dense(Shape::new(8, 65536), Shape::new(65536, 4096));
        assert_eq!(grid.tiles_x, 512);
        assert_eq!(grid.tiles_y, 1);
        assert_eq!(grid.workgroups, (8, 1, 1));
    }

    #[test]
    fn grid_rounds_partial_workgroups_up() {
        let input = Shape::new(20, 3).padded();
        let weights = Shape::new(3, 1000).padded();
        let grid = DispatchGrid::dense(input, weights);
        assert_eq!(weights.cols, 1000);
        assert_eq!(grid.tiles_x, 125);
        assert_eq!(grid.tiles_y, 3);
        assert_eq!(grid.workgroups, (2, 3, 1));
    }

    #[test]
    fn tall_batches_overflow_the_y_axis() {
        // 65535 row tiles fit the default limit, one more row does not.
        let fits = DispatchGrid::dense(
            Shape::new(65535 * 8, 1).padded(),
            Shape::new(1, 1).padded(),
        );
        assert_eq!(fits.workgroups, (1, 65535, 1));
        assert!(fits.fits(65535));

        let tall = DispatchGrid::dense(
            Shape::new(65535 * 8 + 1, 1).padded(),
            Shape::new(1, 1).padded(),
        );
        assert_eq!(tall.workgroups, (1, 65536, 1));
        assert!(!tall.fits(65535));
    }
}
