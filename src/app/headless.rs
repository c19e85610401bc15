// SPDX-License-Identifier: GPL-3.0-only

//! Offscreen rendering and readback
//!
//! Same [`RenderContext`] as the window, drawing into an `Rgba8Unorm` texture
//! that is copied back to the CPU. Used by the `snapshot` command and by GPU
//! tests.

use crate::backends::camera::CameraFacing;
use crate::errors::{AppError, AppResult, PipelineResult};
use crate::gpu::{self, GpuContext};
use crate::media::Frame;
use crate::render::{RenderContext, RenderOutcome};
use crate::render::frame_channel::{FrameChannel, RenderTrigger};
use image::RgbaImage;
use tracing::info;

/// Offscreen target format (linear, matches the window surface choice)
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct HeadlessRenderer {
    gpu: GpuContext,
    context: RenderContext,
    target: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl HeadlessRenderer {
    /// Create a device and a `width` x `height` render target
    pub async fn new(width: u32, height: u32, facing: CameraFacing) -> AppResult<Self> {
        if width == 0 || height == 0 {
            return Err(AppError::Gpu(format!("invalid viewport {}x{}", width, height)));
        }

        let gpu = gpu::create_headless_device("camera-preview offscreen")
            .await
            .map_err(AppError::Gpu)?;
        info!(adapter = %gpu.info.adapter_name, backend = ?gpu.info.backend, width, height, "Offscreen renderer ready");

        let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera-preview offscreen target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let mut context = RenderContext::new(OFFSCREEN_FORMAT, facing, (width, height));
        context.initialize(&gpu.device)?;

        Ok(Self {
            gpu,
            context,
            target,
            view,
            width,
            height,
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Replace the render context for frames of other dimensions
    pub fn rebuild_context(&mut self) -> PipelineResult<()> {
        self.context = self.context.rebuild(&self.gpu.device)?;
        Ok(())
    }

    /// Draw `frame` into the target
    pub fn draw(&mut self, frame: &Frame) -> PipelineResult<()> {
        self.context
            .draw_frame(&self.gpu.device, &self.gpu.queue, &self.view, frame)
    }

    /// Drain `channel` and render, as the window does on a redraw
    pub fn render_from<T: RenderTrigger>(&mut self, channel: &FrameChannel<T>) -> PipelineResult<RenderOutcome> {
        self.context
            .render(&self.gpu.device, &self.gpu.queue, &self.view, channel)
    }

    /// Copy the target back to the CPU
    pub async fn read_pixels(&self) -> AppResult<RgbaImage> {
        let unpadded_bytes_per_row = self.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera-preview readback buffer"),
            size: padded_bytes_per_row as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("camera-preview readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let padded = gpu::read_buffer_async(&self.gpu.device, &buffer)
            .await
            .map_err(AppError::Gpu)?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * self.height) as usize);
        for row in padded.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }

        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| AppError::Gpu("readback size mismatch".to_string()))
    }
}

/// Render one frame offscreen at `viewport` and read it back
pub async fn render_snapshot(frame: &Frame, viewport: (u32, u32), facing: CameraFacing) -> AppResult<RgbaImage> {
    let mut renderer = HeadlessRenderer::new(viewport.0, viewport.1, facing).await?;
    renderer.draw(frame)?;
    renderer.read_pixels().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use crate::media::{test_pattern, yuv_to_rgb};
    use crate::render::{ColorConvertPipeline, PipelineState};

    fn solid_frame(width: u32, height: u32, y: u8, v: u8, u: u8) -> Frame {
        let luma_len = (width * height) as usize;
        let mut data = vec![y; luma_len];
        for _ in 0..luma_len / 4 {
            data.push(v);
            data.push(u);
        }
        Frame::new(data.into(), width, height).unwrap()
    }

    fn expected_rgb(y: u8, v: u8, u: u8) -> [u8; 3] {
        let rgb = yuv_to_rgb(y as f32 / 255.0, u as f32 / 255.0 - 0.5, v as f32 / 255.0 - 0.5);
        rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    fn assert_pixel_close(actual: &[u8], expected: [u8; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(e) <= 2, "{:?} != {:?}", actual, expected);
        }
        assert_eq!(actual[3], 255);
    }

    #[tokio::test]
    async fn test_solid_frame_matches_cpu_conversion() {
        let Ok(mut renderer) = HeadlessRenderer::new(36, 64, CameraFacing::Back).await else {
            println!("Skipping test (no GPU)");
            return;
        };

        // Saturated red: V well above neutral, U below
        let (y, v, u) = (82, 240, 90);
        renderer.draw(&solid_frame(64, 36, y, v, u)).unwrap();
        let image = renderer.read_pixels().await.unwrap();

        let expected = expected_rgb(y, v, u);
        assert!(expected[0] > expected[2], "V must drive red");
        for (x, y_pos) in [(0, 0), (18, 32), (35, 63)] {
            assert_pixel_close(&image.get_pixel(x, y_pos).0, expected);
        }
    }

    #[tokio::test]
    async fn test_draw_count_and_state() {
        let Ok(mut renderer) = HeadlessRenderer::new(32, 32, CameraFacing::Front).await else {
            println!("Skipping test (no GPU)");
            return;
        };

        let frame = Frame::new(test_pattern(32, 16, 0).into(), 32, 16).unwrap();
        renderer.draw(&frame).unwrap();
        renderer.draw(&frame).unwrap();

        let pipeline = renderer.context().pipeline();
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(pipeline.draw_count(), 2);
        // One texture per plane, reused
        assert_eq!(pipeline.textures().creation_count(), 2);
    }

    #[tokio::test]
    async fn test_size_mismatch_aborts_draw_only() {
        let Ok(mut renderer) = HeadlessRenderer::new(16, 16, CameraFacing::Back).await else {
            println!("Skipping test (no GPU)");
            return;
        };

        renderer.draw(&solid_frame(16, 8, 128, 128, 128)).unwrap();
        let err = renderer.draw(&solid_frame(32, 16, 10, 128, 128)).unwrap_err();
        assert!(matches!(err, PipelineError::PlaneSizeMismatch { .. }));
        assert!(!err.is_terminal());
        assert_eq!(renderer.context().pipeline_state(), PipelineState::Ready);

        // The next correctly sized frame draws normally
        renderer.draw(&solid_frame(16, 8, 128, 128, 128)).unwrap();
        assert_eq!(renderer.context().pipeline().draw_count(), 2);
    }

    #[tokio::test]
    async fn test_oversized_frame_does_not_poison_textures() {
        let Ok(mut renderer) = HeadlessRenderer::new(16, 16, CameraFacing::Back).await else {
            println!("Skipping test (no GPU)");
            return;
        };

        let too_wide = renderer.gpu.device.limits().max_texture_dimension_2d + 2;
        let err = renderer.draw(&solid_frame(too_wide, 2, 128, 128, 128)).unwrap_err();
        assert!(!err.is_terminal());
        assert_eq!(renderer.context().pipeline_state(), PipelineState::Ready);
        assert_eq!(renderer.context().pipeline().textures().creation_count(), 0);
        assert_eq!(renderer.context().frame_dimensions(), None);

        // A frame the device can hold draws normally afterwards
        renderer.draw(&solid_frame(16, 8, 128, 128, 128)).unwrap();
        assert_eq!(renderer.context().frame_dimensions(), Some((16, 8)));
        assert_eq!(renderer.context().pipeline().draw_count(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_keeps_last_frame() {
        let Ok(mut renderer) = HeadlessRenderer::new(16, 16, CameraFacing::Front).await else {
            println!("Skipping test (no GPU)");
            return;
        };
        let channel = FrameChannel::new();

        channel.publish(solid_frame(16, 8, 60, 128, 128));
        assert_eq!(renderer.render_from(&channel).unwrap(), RenderOutcome::NewFrame);

        // New capture session with other dimensions
        channel.publish(solid_frame(32, 16, 200, 128, 128));
        let err = renderer.render_from(&channel).unwrap_err();
        assert!(matches!(err, PipelineError::PlaneSizeMismatch { .. }));

        renderer.rebuild_context().unwrap();
        assert_eq!(renderer.context().facing(), CameraFacing::Front);
        assert_eq!(renderer.render_from(&channel).unwrap(), RenderOutcome::StaleFrame);
        assert_eq!(renderer.context().frame_dimensions(), Some((32, 16)));

        let image = renderer.read_pixels().await.unwrap();
        assert_pixel_close(&image.get_pixel(8, 8).0, expected_rgb(200, 128, 128));
    }

    #[tokio::test]
    async fn test_failed_pipeline_leaves_target_untouched() {
        let Ok(mut renderer) = HeadlessRenderer::new(8, 8, CameraFacing::Back).await else {
            println!("Skipping test (no GPU)");
            return;
        };
        let channel = FrameChannel::new();
        channel.publish(solid_frame(8, 8, 235, 128, 128));
        renderer.render_from(&channel).unwrap();
        let shown = expected_rgb(235, 128, 128);

        let broken = ColorConvertPipeline::with_shader_source(OFFSCREEN_FORMAT, "@fragment fn fs_main( -> {");
        renderer.context = RenderContext::with_pipeline(broken, CameraFacing::Back, (8, 8));
        assert!(renderer.context.initialize(&renderer.gpu.device).unwrap_err().is_terminal());

        channel.publish(solid_frame(8, 8, 16, 128, 128));
        for _ in 0..2 {
            let err = renderer.render_from(&channel).unwrap_err();
            assert!(matches!(err, PipelineError::Failed));
        }
        assert_eq!(renderer.context().pipeline_state(), PipelineState::Failed);

        // Neither cleared nor overdrawn
        let image = renderer.read_pixels().await.unwrap();
        assert_pixel_close(&image.get_pixel(4, 4).0, shown);
    }

    #[tokio::test]
    async fn test_stale_redraw_and_clear() {
        let Ok(mut renderer) = HeadlessRenderer::new(8, 8, CameraFacing::Back).await else {
            println!("Skipping test (no GPU)");
            return;
        };
        let channel = FrameChannel::new();

        assert_eq!(renderer.render_from(&channel).unwrap(), RenderOutcome::Cleared);
        let cleared = renderer.read_pixels().await.unwrap();
        // 0.1 in a linear target
        assert_pixel_close(&cleared.get_pixel(4, 4).0, [26, 26, 26]);

        channel.publish(solid_frame(8, 8, 235, 128, 128));
        assert_eq!(renderer.render_from(&channel).unwrap(), RenderOutcome::NewFrame);
        assert_eq!(renderer.render_from(&channel).unwrap(), RenderOutcome::StaleFrame);

        let image = renderer.read_pixels().await.unwrap();
        assert_pixel_close(&image.get_pixel(4, 4).0, expected_rgb(235, 128, 128));
    }
}
