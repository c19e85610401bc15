// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization and error checking
//!
//! Adapter and device creation for both the windowed preview (adapter must be
//! able to present to the window surface) and the offscreen snapshot path.
//! [`checked`] wraps a GPU call in a validation error scope so a failure can
//! be reported with the label of the call that caused it.

use crate::errors::PipelineError;
use tracing::{debug, info, warn};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, GL, ...)
    pub backend: wgpu::Backend,
}

/// A device with the adapter it was created from
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub info: GpuDeviceInfo,
}

/// Instance over every backend compiled in
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Create a device, optionally required to present to `surface`.
///
/// # Arguments
///
/// * `instance` - Instance the surface (if any) was created from
/// * `surface` - Surface the adapter must be compatible with
/// * `label` - A label for the device (for debugging)
pub async fn create_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    label: &str,
) -> Result<GpuContext, String> {
    info!(label = label, "Creating GPU device");

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("Failed to create GPU device: {}", e))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok(GpuContext {
        adapter,
        device,
        queue,
        info,
    })
}

/// Device for offscreen rendering
pub async fn create_headless_device(label: &str) -> Result<GpuContext, String> {
    create_device(&create_instance(), None, label).await
}

/// Run `f` inside a validation error scope.
///
/// Any validation error raised by `f` is logged with `label` and returned as
/// [`PipelineError::Gpu`].
pub fn checked<T>(
    device: &wgpu::Device,
    label: &str,
    f: impl FnOnce() -> T,
) -> Result<T, PipelineError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(error) => {
            let message = error.to_string();
            warn!(label = label, error = %message, "GPU call failed");
            Err(PipelineError::Gpu {
                label: label.to_string(),
                message,
            })
        }
    }
}

/// Helper for async buffer readback (map, poll, read, unmap)
///
/// # Arguments
/// * `device` - The wgpu device for polling
/// * `buffer` - The buffer to read from (must be MAP_READ)
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, String> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    receiver
        .await
        .map_err(|_| "Failed to receive buffer mapping".to_string())?
        .map_err(|e| format!("Failed to map buffer: {:?}", e))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    debug!(bytes = data.len(), "Buffer read back");

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_headless_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_headless_device("test_device").await {
            Ok(gpu) => {
                println!("Created device: {:?}", gpu.info);
                assert!(!gpu.info.adapter_name.is_empty());
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }

    #[tokio::test]
    async fn test_checked_reports_label() {
        let Ok(gpu) = create_headless_device("test_checked").await else {
            println!("Skipping test (no GPU)");
            return;
        };

        let ok = checked(&gpu.device, "valid buffer", || {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::UNIFORM,
                mapped_at_creation: false,
            })
        });
        assert!(ok.is_ok());

        // MAP_READ cannot be combined with UNIFORM
        let err = checked(&gpu.device, "invalid buffer", || {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        });
        match err {
            Err(PipelineError::Gpu { label, .. }) => assert_eq!(label, "invalid buffer"),
            _ => panic!("expected labelled GPU error"),
        }
    }
}
