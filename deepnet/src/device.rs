//! Device abstraction for GPU computation.
//!
//! The `Device` struct owns the process-wide GPU resources (adapter, device,
//! queue and the compiled kernel cache). It is cheap to clone: every layer and
//! tensor holds a handle to the same underlying resources.

use std::sync::{Arc, Mutex};
use wgpu::{Adapter, Device as WgpuDevice, Instance, Queue};

use crate::backend::ComputeEngine;
use crate::config::DeviceConfig;
use crate::error::{NetError, Result};

/// Represents a compute device.
///
/// # Example
/// ```rust,no_run
/// use deepnet::Device;
///
/// let device = Device::new()?;
/// println!("Using: {} ({})", device.name(), device.backend());
/// # Ok::<(), deepnet::NetError>(())
/// ```
#[derive(Clone)]
pub struct Device {
    pub(crate) adapter: Arc<Adapter>,
    pub(crate) device: Arc<WgpuDevice>,
    pub(crate) queue: Arc<Queue>,
    pub(crate) engine: Arc<ComputeEngine>,
    submit_lock: Arc<Mutex<()>>,
}

impl Device {
    /// Acquire the best available GPU with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(&DeviceConfig::default())
    }

    /// Acquire a GPU as described by `config`.
    pub fn with_config(config: &DeviceConfig) -> Result<Self> {
        pollster::block_on(Self::new_async(config))
    }

    /// Async version of [`Device::with_config`].
    pub async fn new_async(config: &DeviceConfig) -> Result<Self> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.into(),
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .ok_or(NetError::NoAdapter)?;

        // Ask for everything the adapter offers so large weight matrices fit
        // in a single storage binding.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(config.label.as_str()),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let info = adapter.get_info();
        log::info!("Acquired GPU adapter {} ({:?})", info.name, info.backend);

        let engine = Arc::new(ComputeEngine::new(&device));

        Ok(Self {
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
            engine,
            submit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Get the name of the GPU adapter.
    pub fn name(&self) -> String {
        self.adapter.get_info().name
    }

    /// Get the backend type (Metal, Vulkan, DX12, etc.)
    pub fn backend(&self) -> String {
        format!("{:?}", self.adapter.get_info().backend)
    }

    /// Largest storage buffer binding the device accepts, in bytes.
    pub fn max_binding_size(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }

    /// Largest workgroup count the device accepts along any dispatch axis.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }

    pub(crate) fn engine(&self) -> &ComputeEngine {
        &self.engine
    }

    /// Submit one command buffer and block until the device has finished it.
    ///
    /// Submissions from every clone of this device are serialized.
    pub(crate) fn submit_and_wait(&self, commands: wgpu::CommandBuffer) {
        let _guard = self
            .submit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = self.queue.submit(std::iter::once(commands));
        let _ = self
            .device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(index));
    }

    /// Block until every mapping callback queued so far has run.
    pub(crate) fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name())
            .field("backend", &self.backend())
            .finish()
    }
}
