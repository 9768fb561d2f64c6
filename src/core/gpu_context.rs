use anyhow::{anyhow, Result};
use std::sync::Arc;
use wgpu::{Adapter, Device, DeviceDescriptor, Features, Instance, Limits, Queue, Surface};
use winit::window::Window;

use crate::config::WindowConfig;

/// Device, queue and the window surface they render to
pub struct GpuContext {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter: Adapter,
    surface: Surface<'static>,
}

impl GpuContext {
    /// Create a context whose adapter can present to `window`
    pub async fn for_window(window: Arc<Window>, config: &WindowConfig) -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: config.graphics_api.backends(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;
        let adapter = Self::request_adapter(&instance, &surface, config.high_performance).await?;
        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = Self::request_device(&adapter).await?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter,
            surface,
        })
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Get reference to the queue
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn surface(&self) -> &Surface<'static> {
        &self.surface
    }

    /// Request adapter with surface compatibility
    async fn request_adapter(instance: &Instance, surface: &Surface<'_>, high_performance: bool) -> Result<Adapter> {
        let power_preference = if high_performance {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::default()
        };

        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("Failed to find appropriate adapter: {:?}", e))
    }

    /// Request device and queue
    async fn request_device(adapter: &Adapter) -> Result<(Device, Queue)> {
        adapter
            .request_device(&DeviceDescriptor {
                label: Some("GPU Context Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create device: {:?}", e))
    }
}
