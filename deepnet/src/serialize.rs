//! Network Serialization
//!
//! Save and load a whole [`DeepNet`]: its config plus every learned tensor.
//!
//! Format (all integers u32 little-endian):
//! - 8 bytes: magic `DEEPNET\0`
//! - 4 bytes: format version
//! - 4 bytes: config length, then that many bytes of [`NetConfig`] JSON
//! - 4 bytes: number of tensors
//! - For each tensor:
//!   - 4 bytes: name length, then the name (utf8), e.g. `layers.0.weights`
//!   - 4 bytes: number of dimensions, then each dimension
//!   - 4 bytes: data length in floats, then the data (f32 each)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::nn::DeepNet;
use crate::tensor::Shape;
use crate::Device;

const MAGIC: &[u8; 8] = b"DEEPNET\0";
const VERSION: u32 = 1;
const MAX_NAME_LEN: usize = 1024;
const MAX_CONFIG_LEN: usize = 1 << 20;

/// A tensor as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTensor {
    pub shape: Shape,
    pub data: Vec<f32>,
}

/// Write `net` (config and parameters) to `path`.
pub fn save_net<P: AsRef<Path>>(net: &DeepNet, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);

    write_header(&mut file, &net.config())?;

    let mut tensors = Vec::new();
    for (i, layer) in net.layers().iter().enumerate() {
        for (name, tensor) in layer.named_parameters() {
            tensors.push((parameter_key(i, name), tensor));
        }
    }

    write_u32(&mut file, tensors.len() as u32)?;
    for (name, tensor) in tensors {
        let data = tensor.read()?;
        write_tensor(&mut file, &name, tensor.shape(), &data)?;
    }
    file.flush()?;

    log::info!("Saved {} layers to {}", net.len(), path.display());
    Ok(())
}

/// Rebuild a network saved by [`save_net`] on `device`.
pub fn load_net<P: AsRef<Path>>(device: &Device, path: P) -> Result<DeepNet> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);

    let config = read_header(&mut file)?;
    let mut tensors = read_tensors(&mut file)?;

    let mut net = DeepNet::from_config(device, &config)?;
    for i in 0..net.len() {
        let expected: Vec<(&'static str, Shape)> = match net.layer(i) {
            Some(layer) => layer
                .named_parameters()
                .into_iter()
                .map(|(name, tensor)| (name, tensor.shape()))
                .collect(),
            None => continue,
        };

        for (name, shape) in expected {
            let key = parameter_key(i, name);
            let stored = tensors
                .remove(&key)
                .ok_or_else(|| NetError::MissingParameter(key.clone()))?;
            if stored.shape != shape {
                return Err(NetError::shape("stored parameter", shape, stored.shape));
            }
            if let Some(layer) = net.layer_mut(i) {
                layer.load_parameter(name, &stored.data)?;
            }
        }
    }

    if !tensors.is_empty() {
        log::warn!(
            "Ignored {} unused tensors in {}",
            tensors.len(),
            path.display()
        );
    }
    log::info!("Loaded {} layers from {}", net.len(), path.display());
    Ok(net)
}

fn parameter_key(layer: usize, name: &str) -> String {
    format!("layers.{}.{}", layer, name)
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4)?;
    Ok(u32::from_le_bytes(buf4))
}

/// Read exactly `len` bytes, growing the buffer only as data arrives so a
/// corrupt length cannot force a huge allocation.
fn read_len<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(bytes)
}

fn write_header<W: Write>(w: &mut W, config: &NetConfig) -> Result<()> {
    w.write_all(MAGIC)?;
    write_u32(w, VERSION)?;
    let json = serde_json::to_vec(config)?;
    write_u32(w, json.len() as u32)?;
    w.write_all(&json)?;
    Ok(())
}

fn read_header<R: Read>(r: &mut R) -> Result<NetConfig> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NetError::InvalidFormat("bad magic".into()));
    }

    let version = read_u32(r)?;
    if version != VERSION {
        return Err(NetError::InvalidFormat(format!(
            "unsupported version {}",
            version
        )));
    }

    let len = read_u32(r)? as usize;
    if len > MAX_CONFIG_LEN {
        return Err(NetError::InvalidFormat(format!("config of {} bytes", len)));
    }
    let json = read_len(r, len)?;
    Ok(serde_json::from_slice(&json)?)
}

fn write_tensor<W: Write>(w: &mut W, name: &str, shape: Shape, data: &[f32]) -> Result<()> {
    let name_bytes = name.as_bytes();
    write_u32(w, name_bytes.len() as u32)?;
    w.write_all(name_bytes)?;

    let dims = shape.dims();
    write_u32(w, dims.len() as u32)?;
    for dim in dims {
        write_u32(w, dim as u32)?;
    }

    write_u32(w, data.len() as u32)?;
    for val in data {
        w.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

fn read_tensors<R: Read>(r: &mut R) -> Result<HashMap<String, StoredTensor>> {
    let count = read_u32(r)?;
    let mut tensors = HashMap::new();

    for _ in 0..count {
        let name_len = read_u32(r)? as usize;
        if name_len > MAX_NAME_LEN {
            return Err(NetError::InvalidFormat(format!(
                "tensor name of {} bytes",
                name_len
            )));
        }
        let mut name_bytes = vec![0u8; name_len];
        r.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| NetError::InvalidFormat("tensor name is not utf8".into()))?;

        let ndim = read_u32(r)? as usize;
        let mut dims = Vec::with_capacity(ndim.min(2));
        for _ in 0..ndim {
            dims.push(read_u32(r)? as usize);
        }
        let shape = Shape::from_dims(&dims)
            .map_err(|_| NetError::InvalidFormat(format!("{} has rank {}", name, ndim)))?;

        let data_len = read_u32(r)? as usize;
        if data_len != shape.count() {
            return Err(NetError::shape("stored tensor data", shape.count(), data_len));
        }
        let byte_len = data_len.checked_mul(4).ok_or_else(|| {
            NetError::InvalidFormat(format!("{} has {} floats", name, data_len))
        })?;
        let bytes = read_len(r, byte_len)?;
        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        tensors.insert(name, StoredTensor { shape, data });
    }

    Ok(tensors)
}
