// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization and capability checks.
//!
//! The filter renders into 32-bit float targets and samples them with linear
//! filtering, which core WebGPU does not guarantee. [`FilterCapabilities`]
//! captures what the device offers so the pipeline can refuse to start
//! instead of producing garbage.

mod readback;

pub use readback::{padded_bytes_per_row, read_buffer_async};
pub(crate) use readback::strip_row_padding;

use crate::constants::WORKING_FORMAT;
use crate::errors::{CapabilityError, GpuError};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Re-export so every module names the same wgpu
pub use ::wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Adapter class (discrete, integrated, software...)
    pub device_type: wgpu::DeviceType,
}

/// What the device offers for the filter's float render targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCapabilities {
    /// `FLOAT32_FILTERABLE` is enabled on the device
    pub float32_filterable: bool,
    /// The working format can be a render attachment
    pub working_format_renderable: bool,
    /// The working format supports filtered sampling
    pub working_format_filterable: bool,
    /// Largest 2D texture dimension the device accepts
    pub max_texture_dimension: u32,
}

impl FilterCapabilities {
    /// Query the capabilities of an adapter/device pair
    pub fn query(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Self {
        let format_features = adapter.get_texture_format_features(WORKING_FORMAT);
        Self {
            float32_filterable: device
                .features()
                .contains(wgpu::Features::FLOAT32_FILTERABLE),
            working_format_renderable: format_features
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
            working_format_filterable: format_features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE),
            max_texture_dimension: device.limits().max_texture_dimension_2d,
        }
    }

    /// Fail unless float rendering and linear float filtering are available
    pub fn require(&self) -> Result<(), CapabilityError> {
        if !self.working_format_renderable {
            return Err(CapabilityError::FormatUnsupported {
                format: "Rgba32Float",
                missing: "render attachment",
            });
        }
        if !self.float32_filterable {
            return Err(CapabilityError::MissingFeature("FLOAT32_FILTERABLE"));
        }
        if !self.working_format_filterable {
            return Err(CapabilityError::FormatUnsupported {
                format: "Rgba32Float",
                missing: "linear filtering",
            });
        }
        Ok(())
    }
}

/// A rendering context: device, queue and the adapter they came from.
///
/// Cloning shares the same device. Device loss is recorded by a callback so
/// the pipeline can report it from `apply` instead of rendering into a dead
/// context.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
    adapter: Arc<wgpu::Adapter>,
    lost: Arc<Mutex<Option<String>>>,
}

impl GpuContext {
    /// Create a context on the best available adapter.
    ///
    /// `FLOAT32_FILTERABLE` is requested when the adapter has it; when it
    /// does not, the context is still returned and the pipeline constructor
    /// reports the missing capability.
    pub async fn new(label: &str) -> Result<Self, CapabilityError> {
        info!(label = label, "Creating GPU device for guided filter");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| CapabilityError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "GPU adapter selected"
        );

        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;
        if required_features.is_empty() {
            warn!(
                adapter = %adapter_info.name,
                "Adapter lacks FLOAT32_FILTERABLE; guided filter will not be available"
            );
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| CapabilityError::DeviceRequest(e.to_string()))?;

        Ok(Self::from_parts(adapter, device, queue))
    }

    /// Blocking variant of [`GpuContext::new`]
    pub fn new_blocking(label: &str) -> Result<Self, CapabilityError> {
        pollster::block_on(Self::new(label))
    }

    /// Wrap a device created elsewhere (e.g. shared with a UI renderer)
    pub fn from_parts(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let raw_info = adapter.get_info();
        let lost = Arc::new(Mutex::new(None));

        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            warn!(?reason, message = %message, "GPU device lost");
            if let Ok(mut slot) = lost_flag.lock() {
                *slot = Some(format!("{:?}: {}", reason, message));
            }
        });

        debug!(adapter = %raw_info.name, "GPU context ready");

        Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            info: GpuDeviceInfo {
                adapter_name: raw_info.name,
                backend: raw_info.backend,
                device_type: raw_info.device_type,
            },
            adapter: Arc::new(adapter),
            lost,
        }
    }

    /// Capabilities relevant to the filter
    pub fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities::query(&self.adapter, &self.device)
    }

    /// Reason the device was lost, if it has been
    pub fn lost_reason(&self) -> Option<String> {
        self.lost.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Run `f` inside validation and out-of-memory error scopes.
///
/// Errors raised by wgpu calls inside `f` are returned instead of reaching
/// the device's uncaptured-error handler.
pub fn error_scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = f();

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(error) => Err(GpuError::from(error)),
        None => Ok(value),
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("info", &self.info)
            .field("lost", &self.lost_reason())
            .finish()
    }
}
