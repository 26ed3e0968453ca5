//! Feed-forward graph
//!
//! An ordered chain of layers. The graph owns every layer and keeps the
//! chain consistent: each layer's input width equals its predecessor's output
//! width, the first layer reads `input_size` values per row and every layer
//! runs the same batch.

use super::{FullyConnected, Layer};
use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::tensor::{Shape, Tensor};
use crate::Device;

/// A sequential feed-forward network.
///
/// # Example
/// ```rust,no_run
/// use deepnet::prelude::*;
///
/// let device = Device::new()?;
/// let mut net = DeepNet::new(784, 8)?;
/// net.add_layer(Box::new(FullyConnected::builder(256).build(&device)?))?;
/// net.add_layer(Box::new(
///     FullyConnected::builder(10)
///         .activation(Activation::Sigmoid)
///         .build(&device)?,
/// ))?;
///
/// let scores = net.forward(&vec![0.0; 784 * 8])?; // 8 rows of 10
/// # Ok::<(), deepnet::NetError>(())
/// ```
#[derive(Debug)]
pub struct DeepNet {
    input_size: usize,
    batch_size: usize,
    layers: Vec<Box<dyn Layer>>,
    /// Reused across forward calls while the shape holds.
    input: Option<Tensor>,
}

impl DeepNet {
    pub fn new(input_size: usize, batch_size: usize) -> Result<Self> {
        check_nonzero("graph input size", input_size)?;
        check_nonzero("graph batch size", batch_size)?;
        Ok(Self {
            input_size,
            batch_size,
            layers: Vec::new(),
            input: None,
        })
    }

    /// Build a randomized network of [`FullyConnected`] layers.
    pub fn from_config(device: &Device, config: &NetConfig) -> Result<Self> {
        let mut net = Self::new(config.input_size, config.batch_size)?;
        for layer in &config.layers {
            let dense = FullyConnected::from_config(
                device,
                layer,
                net.output_size(),
                net.batch_size,
                config.kernel,
            )?;
            net.add_layer(Box::new(dense))?;
        }
        log::info!(
            "Built network {} -> {} with {} layers",
            net.input_size,
            net.output_size(),
            net.layers.len()
        );
        Ok(net)
    }

    /// Describe the current shape and layer settings. Each layer records its
    /// own kernel variant; the network-wide one is the first layer's.
    pub fn config(&self) -> NetConfig {
        NetConfig {
            input_size: self.input_size,
            batch_size: self.batch_size,
            kernel: self
                .layers
                .first()
                .map(|l| l.kernel().variant)
                .unwrap_or_default(),
            layers: self.layers.iter().map(|l| l.config()).collect(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Width of the last layer, or the input size of an empty graph.
    pub fn output_size(&self) -> usize {
        self.layers
            .last()
            .map(|l| l.output_size())
            .unwrap_or(self.input_size)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|l| l.as_ref())
    }

    /// Direct access to one layer. Resizing it behind the graph's back makes
    /// the next [`DeepNet::forward`] fail validation.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut (dyn Layer + 'static)> {
        self.layers.get_mut(index).map(|l| l.as_mut())
    }

    /// Append a layer, sizing its input from the current last layer.
    pub fn add_layer(&mut self, layer: Box<dyn Layer>) -> Result<()> {
        let index = self.layers.len();
        self.insert_layer(index, layer)
    }

    /// Insert a layer at `index`.
    ///
    /// The new layer takes its input width from its predecessor (or the graph
    /// input) and the graph batch size. The layer that followed `index` is
    /// resized to read the new layer's output, which re-randomizes its
    /// weights. Nothing changes if any step fails.
    pub fn insert_layer(&mut self, index: usize, mut layer: Box<dyn Layer>) -> Result<()> {
        if index > self.layers.len() {
            return Err(NetError::InvalidIndex {
                index,
                len: self.layers.len(),
            });
        }

        let input_size = match index {
            0 => self.input_size,
            i => self.layers[i - 1].output_size(),
        };
        layer.resize_input(input_size)?;
        layer.resize_batch(self.batch_size)?;

        if let Some(next) = self.layers.get_mut(index) {
            let invalidated = next.resize_input(layer.output_size())?;
            if invalidated.any() {
                log::debug!("Insert at {} re-randomized successor {}", index, next.name());
            }
        }

        log::debug!(
            "Inserted layer {} at {} [{} -> {}]",
            layer.name(),
            index,
            layer.input_size(),
            layer.output_size()
        );
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Replace every layer, chaining them in the given order.
    pub fn set_layers(&mut self, layers: Vec<Box<dyn Layer>>) -> Result<()> {
        let mut chained = Vec::with_capacity(layers.len());
        let mut input_size = self.input_size;
        for mut layer in layers {
            layer.resize_input(input_size)?;
            layer.resize_batch(self.batch_size)?;
            input_size = layer.output_size();
            chained.push(layer);
        }
        log::debug!("Replaced graph with {} layers", chained.len());
        self.layers = chained;
        Ok(())
    }

    /// Remove and return the layer at `index`. Its successor is resized to
    /// read whatever now precedes it.
    pub fn remove_layer(&mut self, index: usize) -> Result<Box<dyn Layer>> {
        if index >= self.layers.len() {
            return Err(NetError::InvalidIndex {
                index,
                len: self.layers.len(),
            });
        }

        let input_size = match index {
            0 => self.input_size,
            i => self.layers[i - 1].output_size(),
        };
        if let Some(next) = self.layers.get_mut(index + 1) {
            next.resize_input(input_size)?;
        }

        let removed = self.layers.remove(index);
        log::debug!("Removed layer {} from {}", removed.name(), index);
        Ok(removed)
    }

    /// Change the number of values per input row. Only the first layer is
    /// resized.
    pub fn set_input_size(&mut self, input_size: usize) -> Result<()> {
        check_nonzero("graph input size", input_size)?;
        if let Some(first) = self.layers.first_mut() {
            first.resize_input(input_size)?;
        }
        log::debug!("Graph input {} -> {}", self.input_size, input_size);
        self.input_size = input_size;
        self.input = None;
        Ok(())
    }

    /// Change the number of rows per forward call on every layer.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        check_nonzero("graph batch size", batch_size)?;
        for i in 0..self.layers.len() {
            if let Err(err) = self.layers[i].resize_batch(batch_size) {
                // Only the output is reallocated, so rolling back is lossless.
                for layer in &mut self.layers[..i] {
                    if let Err(rollback) = layer.resize_batch(self.batch_size) {
                        log::error!(
                            "Layer {} stuck at batch {} after failed resize: {}",
                            layer.name(),
                            batch_size,
                            rollback
                        );
                    }
                }
                return Err(err);
            }
        }
        log::debug!("Graph batch {} -> {}", self.batch_size, batch_size);
        self.batch_size = batch_size;
        self.input = None;
        Ok(())
    }

    /// Check every chaining invariant.
    pub fn validate(&self) -> Result<()> {
        let mut expected_input = self.input_size;
        for layer in &self.layers {
            if layer.input_size() != expected_input {
                return Err(NetError::shape(
                    "layer chain",
                    format!("{} input {}", layer.name(), expected_input),
                    layer.input_size(),
                ));
            }
            if layer.batch_size() != self.batch_size {
                return Err(NetError::shape(
                    "layer batch",
                    format!("{} batch {}", layer.name(), self.batch_size),
                    layer.batch_size(),
                ));
            }
            if layer.kernel().activation != layer.activation() {
                return Err(NetError::PipelineMismatch {
                    bound: layer.kernel().activation,
                    requested: layer.activation(),
                });
            }
            expected_input = layer.output_size();
        }
        Ok(())
    }

    /// Run every layer in order on `batch_size` rows of `input_size` values.
    ///
    /// Returns the last layer's output, `batch_size` rows of `output_size`
    /// values, row-major.
    pub fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if self.layers.is_empty() {
            return Err(NetError::NotReady);
        }
        let shape = Shape::new(self.batch_size, self.input_size);
        if input.len() != shape.count() {
            return Err(NetError::shape("graph input", shape.count(), input.len()));
        }
        self.validate()?;

        let input_tensor = match self.input.take() {
            Some(mut tensor) if tensor.shape() == shape => {
                tensor.write(input)?;
                tensor
            }
            _ => Tensor::from_data(self.layers[0].device(), input, shape)?,
        };

        let result = self.run(&input_tensor);
        self.input = Some(input_tensor);
        result?;

        match self.layers.last() {
            Some(last) => last.output().read(),
            None => Err(NetError::NotReady),
        }
    }

    fn run(&mut self, input: &Tensor) -> Result<()> {
        self.layers[0].forward(input)?;
        for i in 1..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            rest[0].forward(done[i - 1].output())?;
        }
        Ok(())
    }
}

fn check_nonzero(context: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(NetError::shape(context, "at least 1", value));
    }
    Ok(())
}
