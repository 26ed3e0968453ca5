//! Build a small network, run it, insert a layer, run it again.
//!
//! Run with: RUST_LOG=debug cargo run --example forward [config.json]

use anyhow::Context;
use deepnet::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            NetConfig::from_file(&path).with_context(|| format!("reading {}", path))?
        }
        None => NetConfig {
            input_size: 784,
            batch_size: 8,
            kernel: KernelVariant::Checked,
            layers: vec![
                DenseConfig::new(256, Activation::Relu),
                DenseConfig::new(10, Activation::Sigmoid),
            ],
        },
    };

    let device = Device::new().context("acquiring GPU")?;
    println!("Using: {} ({})", device.name(), device.backend());

    let mut net = DeepNet::from_config(&device, &config)?;
    let input: Vec<f32> = (0..net.input_size() * net.batch_size())
        .map(|i| (i as f32 * 0.01).sin())
        .collect();

    let out = net.forward(&input)?;
    println!(
        "Output ({} x {}): {:?}",
        net.batch_size(),
        net.output_size(),
        &out[..net.output_size()]
    );

    let hidden = FullyConnected::builder(64)
        .activation(Activation::Tanh)
        .name("inserted")
        .build(&device)?;
    net.insert_layer(1, Box::new(hidden))?;
    for layer in net.layers() {
        println!(
            "  {:<12} {:>5} -> {:<5} {}",
            layer.name(),
            layer.input_size(),
            layer.output_size(),
            layer.activation()
        );
    }

    let out = net.forward(&input)?;
    println!("After insert: {:?}", &out[..net.output_size()]);
    Ok(())
}
