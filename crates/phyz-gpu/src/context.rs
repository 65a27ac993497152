//! Device discovery.

use log::debug;
use phyz_md::{MdError, Result};
use std::sync::Arc;

/// One opened device and its queue.
#[derive(Clone)]
pub struct GpuDevice {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub name: String,
}

/// The set of devices a GPU method spreads its particles over.
#[derive(Clone)]
pub struct GpuContext {
    devices: Vec<GpuDevice>,
}

impl GpuContext {
    /// Open up to `n_devices` adapters. Fails if none is available.
    pub fn new(n_devices: usize) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        if adapters.is_empty() {
            return Err(MdError::GpuUnavailable("no GPU adapter found".into()));
        }

        let mut devices = Vec::new();
        for adapter in adapters.into_iter().take(n_devices.max(1)) {
            let info = adapter.get_info();
            let (device, queue) = pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("phyz-gpu-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            ))
            .map_err(|e| MdError::Gpu(format!("failed to open {}: {e}", info.name)))?;

            debug!("using GPU adapter {} ({:?})", info.name, info.backend);
            devices.push(GpuDevice {
                device: Arc::new(device),
                queue: Arc::new(queue),
                name: info.name,
            });
        }

        if devices.len() < n_devices {
            debug!("requested {n_devices} GPU devices, found {}", devices.len());
        }
        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[GpuDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
