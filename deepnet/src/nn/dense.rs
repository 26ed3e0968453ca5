//! Fully Connected Layer
//!
//! `output = activation(input * weights + bias)`, one kernel dispatch per
//! forward call.

use std::sync::Arc;
use wgpu::util::DeviceExt;

use super::init::default_initializer;
use super::{Activation, Initializer, Invalidated, Layer, LayerId};
use crate::backend::{Dims, DispatchGrid, KernelKey, KernelVariant};
use crate::config::DenseConfig;
use crate::error::{NetError, Result};
use crate::tensor::{Shape, Tensor};
use crate::Device;

/// Bind group and dims uniform for one (input, weights, bias, output) tuple.
struct Binding {
    key: [u64; 4],
    grid: DispatchGrid,
    _dims: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Fully connected (dense) layer.
///
/// # Example
/// ```rust,no_run
/// use deepnet::prelude::*;
///
/// let device = Device::new()?;
/// let mut layer = FullyConnected::builder(4)
///     .input_size(3)
///     .batch_size(2)
///     .activation(Activation::Tanh)
///     .build(&device)?;
///
/// let x = Tensor::from_data(&device, &[0.5; 6], Shape::new(2, 3))?;
/// layer.forward(&x)?;
/// let y = layer.output().read()?; // [2, 4]
/// # Ok::<(), deepnet::NetError>(())
/// ```
pub struct FullyConnected {
    id: LayerId,
    name: String,
    device: Device,
    activation: Activation,
    kernel: KernelKey,
    input_size: usize,
    output_size: usize,
    batch_size: usize,
    learning_rate: f32,
    momentum: f32,
    weights: Tensor,
    bias: Tensor,
    output: Tensor,
    initializer: Arc<dyn Initializer>,
    binding: Option<Binding>,
}

/// Builder for [`FullyConnected`].
pub struct FullyConnectedBuilder<'a> {
    output_size: usize,
    input_size: usize,
    batch_size: usize,
    activation: Activation,
    variant: KernelVariant,
    name: Option<String>,
    weights: Option<&'a [f32]>,
    bias: Option<&'a [f32]>,
    initializer: Option<Arc<dyn Initializer>>,
    learning_rate: f32,
    momentum: f32,
}

impl<'a> FullyConnectedBuilder<'a> {
    /// Defaults to 1. Adding the layer to a graph resizes it to fit.
    pub fn input_size(mut self, input_size: usize) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn kernel_variant(mut self, variant: KernelVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Row-major `[input, output]` weights. Randomized when absent.
    pub fn weights(mut self, weights: &'a [f32]) -> Self {
        self.weights = Some(weights);
        self
    }

    /// `output` bias values. Randomized when absent.
    pub fn bias(mut self, bias: &'a [f32]) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn initializer(mut self, initializer: Arc<dyn Initializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn build(self, device: &Device) -> Result<FullyConnected> {
        let (fan_in, fan_out) = (self.input_size, self.output_size);
        check_dispatch(device, self.batch_size, fan_in, fan_out)?;
        let initializer = self.initializer.unwrap_or_else(default_initializer);

        let weights_shape = Shape::new(fan_in, fan_out);
        let weights = match self.weights {
            Some(data) => Tensor::from_data(device, data, weights_shape)?,
            None => {
                let count = weights_shape.count();
                let data = initializer.sample(self.activation, fan_in, fan_out, count);
                Tensor::from_data(device, &data, weights_shape)?
            }
        };

        let bias_shape = Shape::vector(fan_out);
        let bias = match self.bias {
            Some(data) => Tensor::from_data(device, data, bias_shape)?,
            None => {
                let data = initializer.sample(self.activation, fan_in, fan_out, fan_out);
                Tensor::from_data(device, &data, bias_shape)?
            }
        };

        let output = Tensor::zeros(device, Shape::new(self.batch_size, fan_out))?;

        let id = LayerId::next();
        let name = self.name.unwrap_or_else(|| format!("dense_{}", id));
        log::debug!(
            "Built layer {} [{} -> {}] batch {} ({})",
            name,
            fan_in,
            fan_out,
            self.batch_size,
            self.activation
        );

        Ok(FullyConnected {
            id,
            name,
            device: device.clone(),
            activation: self.activation,
            kernel: KernelKey::new(self.activation, self.variant),
            input_size: fan_in,
            output_size: fan_out,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            weights,
            bias,
            output,
            initializer,
            binding: None,
        })
    }
}

impl FullyConnected {
    /// Start building a layer with `output_size` nodes.
    pub fn builder<'a>(output_size: usize) -> FullyConnectedBuilder<'a> {
        let defaults = DenseConfig::new(output_size, Activation::default());
        FullyConnectedBuilder {
            output_size,
            input_size: 1,
            batch_size: 1,
            activation: defaults.activation,
            variant: KernelVariant::default(),
            name: None,
            weights: None,
            bias: None,
            initializer: None,
            learning_rate: defaults.learning_rate,
            momentum: defaults.momentum,
        }
    }

    /// Build a randomized layer from its config. `variant` applies unless the
    /// config names its own kernel.
    pub fn from_config(
        device: &Device,
        config: &DenseConfig,
        input_size: usize,
        batch_size: usize,
        variant: KernelVariant,
    ) -> Result<Self> {
        let mut builder = Self::builder(config.output_size)
            .input_size(input_size)
            .batch_size(batch_size)
            .activation(config.activation)
            .kernel_variant(config.kernel.unwrap_or(variant))
            .learning_rate(config.learning_rate)
            .momentum(config.momentum);
        if let Some(name) = &config.name {
            builder = builder.name(name.clone());
        }
        builder.build(device)
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }

    /// Change the activation and rebind the matching kernel. Parameters are
    /// kept.
    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
        self.kernel = KernelKey::new(activation, self.kernel.variant);
        log::debug!("Layer {} rebound to {}", self.name, self.kernel.entry_point());
    }

    /// Used by every later re-randomization.
    pub fn set_initializer(&mut self, initializer: Arc<dyn Initializer>) {
        self.initializer = initializer;
    }

    /// Regenerate every weight from the initializer.
    pub fn randomize_all_weights(&mut self) -> Result<()> {
        let data = self.sample(self.weights.numel());
        self.weights.write(&data)
    }

    /// Regenerate every bias value from the initializer.
    pub fn randomize_all_biases(&mut self) -> Result<()> {
        let data = self.sample(self.bias.numel());
        self.bias.write(&data)
    }

    fn sample(&self, count: usize) -> Vec<f32> {
        self.initializer
            .sample(self.activation, self.input_size, self.output_size, count)
    }

    fn random_tensor(&self, shape: Shape, fan_in: usize, fan_out: usize) -> Result<Tensor> {
        let data = self
            .initializer
            .sample(self.activation, fan_in, fan_out, shape.count());
        Tensor::from_data(&self.device, &data, shape)
    }

    fn build_binding(&self, input: &Tensor, key: [u64; 4]) -> Binding {
        let dims = Dims::dense(
            input.shape(),
            input.padded_shape(),
            self.weights.shape(),
            self.weights.padded_shape(),
        );
        let dims_buffer = self
            .device
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Dense Dims"),
                contents: bytemuck::bytes_of(&dims),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.engine().dense_bind_group(
            &self.device.device,
            input.buffer(),
            self.weights.buffer(),
            self.bias.buffer(),
            self.output.buffer(),
            &dims_buffer,
        );
        log::debug!("Layer {} rebuilt bindings for {:?}", self.name, dims);
        Binding {
            key,
            grid: DispatchGrid::dense(input.padded_shape(), self.weights.padded_shape()),
            _dims: dims_buffer,
            bind_group,
        }
    }
}

/// Reject shapes whose dense dispatch the device cannot launch.
fn check_dispatch(
    device: &Device,
    batch_size: usize,
    input_size: usize,
    output_size: usize,
) -> Result<()> {
    let grid = DispatchGrid::dense(
        Shape::new(batch_size, input_size).padded(),
        Shape::new(input_size, output_size).padded(),
    );
    let limit = device.max_workgroups_per_dimension();
    if !grid.fits(limit) {
        return Err(NetError::DispatchTooLarge {
            workgroups: grid.workgroups,
            limit,
        });
    }
    Ok(())
}

impl Layer for FullyConnected {
    fn id(&self) -> LayerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn activation(&self) -> Activation {
        self.activation
    }

    fn kernel(&self) -> KernelKey {
        self.kernel
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn forward(&mut self, input: &Tensor) -> Result<()> {
        let expected = Shape::new(self.batch_size, self.input_size);
        if input.shape() != expected {
            return Err(NetError::shape("layer input", expected, input.shape()));
        }
        if self.kernel.activation != self.activation {
            return Err(NetError::PipelineMismatch {
                bound: self.kernel.activation,
                requested: self.activation,
            });
        }

        let key = [
            input.id(),
            self.weights.id(),
            self.bias.id(),
            self.output.id(),
        ];
        let binding = match self.binding.take() {
            Some(binding) if binding.key == key => binding,
            _ => self.build_binding(input, key),
        };

        let engine = self.device.engine();
        let pipeline = engine
            .pipeline(self.kernel)
            .ok_or(NetError::PipelineMismatch {
                bound: self.kernel.activation,
                requested: self.activation,
            })?;

        let mut encoder = self
            .device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Dense Encoder"),
            });
        engine.encode_dense(&mut encoder, pipeline, &binding.bind_group, binding.grid);
        log::trace!(
            "Layer {} dispatch {} tiles {}x{} groups {:?}",
            self.name,
            self.kernel.entry_point(),
            binding.grid.tiles_x,
            binding.grid.tiles_y,
            binding.grid.workgroups
        );
        self.device.submit_and_wait(encoder.finish());

        self.binding = Some(binding);
        Ok(())
    }

    fn output(&self) -> &Tensor {
        &self.output
    }

    fn resize_input(&mut self, input_size: usize) -> Result<Invalidated> {
        if input_size == self.input_size {
            return Ok(Invalidated::NONE);
        }
        let weights = self.random_tensor(
            Shape::new(input_size, self.output_size),
            input_size,
            self.output_size,
        )?;
        log::warn!(
            "Layer {} input {} -> {}: weights re-randomized",
            self.name,
            self.input_size,
            input_size
        );
        self.input_size = input_size;
        self.weights = weights;
        self.binding = None;
        Ok(Invalidated::WEIGHTS)
    }

    fn resize_batch(&mut self, batch_size: usize) -> Result<Invalidated> {
        if batch_size == self.batch_size {
            return Ok(Invalidated::NONE);
        }
        check_dispatch(&self.device, batch_size, self.input_size, self.output_size)?;
        let output = Tensor::zeros(&self.device, Shape::new(batch_size, self.output_size))?;
        log::debug!(
            "Layer {} batch {} -> {}",
            self.name,
            self.batch_size,
            batch_size
        );
        self.batch_size = batch_size;
        self.output = output;
        self.binding = None;
        Ok(Invalidated::NONE)
    }

    fn resize_output(&mut self, output_size: usize) -> Result<Invalidated> {
        if output_size == self.output_size {
            return Ok(Invalidated::NONE);
        }
        check_dispatch(&self.device, self.batch_size, self.input_size, output_size)?;
        let weights = self.random_tensor(
            Shape::new(self.input_size, output_size),
            self.input_size,
            output_size,
        )?;
        let bias = self.random_tensor(Shape::vector(output_size), self.input_size, output_size)?;
        let output = Tensor::zeros(&self.device, Shape::new(self.batch_size, output_size))?;
        log::warn!(
            "Layer {} output {} -> {}: weights and bias re-randomized",
            self.name,
            self.output_size,
            output_size
        );
        self.output_size = output_size;
        self.weights = weights;
        self.bias = bias;
        self.output = output;
        self.binding = None;
        Ok(Invalidated::ALL)
    }

    fn named_parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("weights", &self.weights), ("bias", &self.bias)]
    }

    fn load_parameter(&mut self, name: &str, data: &[f32]) -> Result<()> {
        match name {
            "weights" => self.weights.write(data),
            "bias" => self.bias.write(data),
            other => Err(NetError::MissingParameter(format!("{}.{}", self.name, other))),
        }
    }

    fn config(&self) -> DenseConfig {
        DenseConfig {
            output_size: self.output_size,
            activation: self.activation,
            name: Some(self.name.clone()),
            kernel: Some(self.kernel.variant),
            learning_rate: self.learning_rate,
            momentum: self.momentum,
        }
    }
}

impl std::fmt::Debug for FullyConnected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullyConnected")
            .field("name", &self.name)
            .field("input_size", &self.input_size)
            .field("output_size", &self.output_size)
            .field("batch_size", &self.batch_size)
            .field("kernel", &self.kernel.entry_point())
            .finish()
    }
}
