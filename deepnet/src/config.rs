//! Device and network configuration
//!
//! Plain `serde` structs so a network can be described in a JSON file and
//! rebuilt with [`DeepNet::from_config`](crate::nn::DeepNet::from_config).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backend::KernelVariant;
use crate::error::Result;
use crate::nn::Activation;

/// Adapter power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Power {
    #[default]
    HighPerformance,
    LowPower,
}

impl From<Power> for wgpu::PowerPreference {
    fn from(power: Power) -> Self {
        match power {
            Power::HighPerformance => wgpu::PowerPreference::HighPerformance,
            Power::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// How the GPU device is acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub power_preference: Power,

    /// Request a software adapter (e.g. lavapipe, WARP).
    #[serde(default)]
    pub force_fallback_adapter: bool,

    #[serde(default = "default_device_label")]
    pub label: String,
}

fn default_device_label() -> String {
    "deepnet device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            power_preference: Power::default(),
            force_fallback_adapter: false,
            label: default_device_label(),
        }
    }
}

/// One fully connected stage of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    pub output_size: usize,

    #[serde(default)]
    pub activation: Activation,

    #[serde(default)]
    pub name: Option<String>,

    /// Overrides the network-wide [`NetConfig::kernel`] for this layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelVariant>,

    /// Reserved for training.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    /// Reserved for training.
    #[serde(default = "default_momentum")]
    pub momentum: f32,
}

fn default_learning_rate() -> f32 {
    0.01
}
fn default_momentum() -> f32 {
    0.9
}

impl DenseConfig {
    pub fn new(output_size: usize, activation: Activation) -> Self {
        Self {
            output_size,
            activation,
            name: None,
            kernel: None,
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
        }
    }
}

/// A whole feed-forward network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    pub input_size: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Kernel variant for every layer without its own `kernel`.
    #[serde(default)]
    pub kernel: KernelVariant,

    #[serde(default)]
    pub layers: Vec<DenseConfig>,
}

fn default_batch_size() -> usize {
    1
}

impl NetConfig {
    /// Load a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Output width of the last layer, if any.
    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(|l| l.output_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg = NetConfig::from_json(
            r#"{ "input_size": 16, "layers": [ { "output_size": 4 } ] }"#,
        )
        .unwrap();
        assert_eq!(cfg.input_size, 16);
        assert_eq!(cfg.batch_size, 1);
        assert_eq!(cfg.kernel, KernelVariant::Checked);
        assert_eq!(cfg.layers[0].activation, Activation::Tanh);
        assert_eq!(cfg.layers[0].learning_rate, 0.01);
        assert_eq!(cfg.output_size(), Some(4));
    }

    #[test]
    fn parses_explicit_fields() {
        let cfg = NetConfig::from_json(
            r#"{
                "input_size": 3,
                "batch_size": 8,
                "kernel": "unchecked",
                "layers": [
                    { "output_size": 5, "activation": "relu", "name": "hidden" },
                    { "output_size": 2, "activation": "identity", "momentum": 0.5 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.kernel, KernelVariant::Unchecked);
        assert_eq!(cfg.layers[0].activation, Activation::Relu);
        assert_eq!(cfg.layers[0].name.as_deref(), Some("hidden"));
        assert_eq!(cfg.layers[1].momentum, 0.5);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = NetConfig {
            input_size: 10,
            batch_size: 2,
            kernel: KernelVariant::Checked,
            layers: vec![DenseConfig::new(7, Activation::Sigmoid)],
        };
        let back = NetConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn layer_kernel_overrides_network_default() {
        let cfg = NetConfig::from_json(
            r#"{
                "input_size": 4,
                "layers": [
                    { "output_size": 3, "kernel": "unchecked" },
                    { "output_size": 2 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.kernel, KernelVariant::Checked);
        assert_eq!(cfg.layers[0].kernel, Some(KernelVariant::Unchecked));
        assert_eq!(cfg.layers[1].kernel, None);
        assert!(!cfg.to_json().unwrap().contains("null"));
    }

    #[test]
    fn device_config_defaults() {
        let cfg: DeviceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.power_preference, Power::HighPerformance);
        assert!(!cfg.force_fallback_adapter);
        assert_eq!(cfg.label, "deepnet device");
    }
}
