// SPDX-License-Identifier: GPL-3.0-only

//! Luma and chroma plane textures
//!
//! Each plane gets exactly one texture per render context. Textures are
//! created on first use and afterwards only refreshed with sub-image writes.
//! A capture session has fixed dimensions, so asking for a different size
//! once a plane exists is rejected instead of reallocating.

use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::checked;
use std::fmt;
use tracing::debug;

/// One of the two NV21 planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Y, single channel, full resolution
    Luma,
    /// Interleaved VU, two channels, half resolution on both axes
    Chroma,
}

impl Plane {
    pub const ALL: [Plane; 2] = [Plane::Luma, Plane::Chroma];

    /// Slot index, also the texture binding used by the shader
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Plane::Luma => 0,
            Plane::Chroma => 1,
        }
    }

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Plane::Luma => wgpu::TextureFormat::R8Unorm,
            Plane::Chroma => wgpu::TextureFormat::Rg8Unorm,
        }
    }

    #[inline]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Plane::Luma => 1,
            Plane::Chroma => 2,
        }
    }

    /// Texture size for a frame of `width` x `height`
    #[inline]
    pub fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Plane::Luma => (width, height),
            Plane::Chroma => (width / 2, height / 2),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Plane::Luma => "camera-preview luma texture",
            Plane::Chroma => "camera-preview chroma texture",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Luma => write!(f, "Luma"),
            Plane::Chroma => write!(f, "Chroma"),
        }
    }
}

/// A plane's texture and the size it was created with
#[derive(Debug)]
pub struct TextureSlot<T> {
    pub handle: Option<T>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl<T> TextureSlot<T> {
    fn empty(plane: Plane) -> Self {
        Self {
            handle: None,
            width: 0,
            height: 0,
            format: plane.format(),
        }
    }
}

/// Both plane textures of one render context.
///
/// `T` is the texture handle; [`GpuPlane`] on a real device.
#[derive(Debug)]
pub struct PlaneTextureSet<T> {
    slots: [TextureSlot<T>; 2],
    creations: u32,
}

impl<T> Default for PlaneTextureSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PlaneTextureSet<T> {
    pub fn new() -> Self {
        Self {
            slots: [
                TextureSlot::empty(Plane::Luma),
                TextureSlot::empty(Plane::Chroma),
            ],
            creations: 0,
        }
    }

    /// Make sure `plane` has a texture for a `width` x `height` frame.
    ///
    /// `create` is called with the plane's texture size only if the plane has
    /// no texture yet. The slot stays empty when `create` fails, so the next
    /// call tries again. Returns whether a texture was created.
    pub fn ensure<F>(&mut self, plane: Plane, width: u32, height: u32, create: F) -> PipelineResult<bool>
    where
        F: FnOnce(u32, u32) -> PipelineResult<T>,
    {
        let (plane_width, plane_height) = plane.dimensions(width, height);
        let slot = &mut self.slots[plane.index()];

        if slot.handle.is_some() {
            if (slot.width, slot.height) != (plane_width, plane_height) {
                return Err(PipelineError::PlaneSizeMismatch {
                    plane,
                    existing: (slot.width, slot.height),
                    requested: (plane_width, plane_height),
                });
            }
            return Ok(false);
        }

        slot.handle = Some(create(plane_width, plane_height)?);
        slot.width = plane_width;
        slot.height = plane_height;
        self.creations += 1;

        debug!(
            plane = %plane,
            width = plane_width,
            height = plane_height,
            format = ?slot.format,
            "Plane texture created"
        );
        Ok(true)
    }

    pub fn slot(&self, plane: Plane) -> &TextureSlot<T> {
        &self.slots[plane.index()]
    }

    pub fn handle(&self, plane: Plane) -> Option<&T> {
        self.slots[plane.index()].handle.as_ref()
    }

    /// Both planes have textures
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.handle.is_some())
    }

    /// Textures created over the lifetime of this set
    pub fn creation_count(&self) -> u32 {
        self.creations
    }

    /// Frame dimensions the luma texture was created for
    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        let luma = self.slot(Plane::Luma);
        luma.handle.as_ref().map(|_| (luma.width, luma.height))
    }
}

/// GPU texture of one plane with its default view
#[derive(Debug)]
pub struct GpuPlane {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuPlane {
    /// Allocate a sampled, copy-destination texture for `plane`
    pub fn create(device: &wgpu::Device, plane: Plane, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(plane.label()),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: plane.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

impl PlaneTextureSet<GpuPlane> {
    /// [`PlaneTextureSet::ensure`] backed by `device`.
    ///
    /// Creation runs inside a validation error scope; a texture the device
    /// rejected is never stored.
    pub fn ensure_on(
        &mut self,
        device: &wgpu::Device,
        plane: Plane,
        width: u32,
        height: u32,
    ) -> PipelineResult<bool> {
        let label = match plane {
            Plane::Luma => "luma texture create",
            Plane::Chroma => "chroma texture create",
        };
        self.ensure(plane, width, height, |w, h| {
            checked(device, label, || GpuPlane::create(device, plane, w, h))
        })
    }

    /// Overwrite the whole texture of `plane` with `bytes` (tightly packed rows)
    pub fn upload(&self, queue: &wgpu::Queue, plane: Plane, bytes: &[u8]) -> PipelineResult<()> {
        let slot = self.slot(plane);
        let Some(gpu) = slot.handle.as_ref() else {
            return Err(PipelineError::Gpu {
                label: format!("{} upload", plane),
                message: "texture not created".to_string(),
            });
        };

        let bytes_per_row = slot.width * plane.bytes_per_texel();
        let expected = bytes_per_row as usize * slot.height as usize;
        if bytes.len() < expected {
            return Err(PipelineError::PlaneDataTooShort {
                plane,
                expected,
                actual: bytes.len(),
            });
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: slot.width,
                height: slot.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

/// Bilinear sampler clamped on both axes, shared by both planes
pub fn create_plane_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("camera-preview plane sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
