// SPDX-License-Identifier: GPL-3.0-only

//! Render-thread state tied to one graphics surface
//!
//! A `RenderContext` owns every GPU object the preview needs and lives exactly
//! as long as the surface it draws into. Dropping it releases the pipeline and
//! both plane textures together.

use crate::backends::camera::CameraFacing;
use crate::constants::preview;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::Frame;
use crate::render::crop::AspectFitCropCalculator;
use crate::render::frame_channel::{FrameChannel, RenderTrigger};
use crate::render::pipeline::{ColorConvertPipeline, DrawTarget, PipelineState, clear_target};
use crate::render::transform::{TransformBuilder, TransformMatrix};
use tracing::debug;

/// What a call to [`RenderContext::render`] put on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A frame published since the last render
    NewFrame,
    /// The previous frame again (no new frame arrived)
    StaleFrame,
    /// Nothing has been received yet; only the clear color
    Cleared,
}

pub struct RenderContext {
    pipeline: ColorConvertPipeline,
    crop: AspectFitCropCalculator,
    facing: CameraFacing,
    matrix: TransformMatrix,
    viewport: (u32, u32),
    last_frame: Option<Frame>,
}

impl RenderContext {
    pub fn new(target_format: wgpu::TextureFormat, facing: CameraFacing, viewport: (u32, u32)) -> Self {
        Self::with_pipeline(ColorConvertPipeline::new(target_format), facing, viewport)
    }

    pub(crate) fn with_pipeline(
        pipeline: ColorConvertPipeline,
        facing: CameraFacing,
        viewport: (u32, u32),
    ) -> Self {
        Self {
            pipeline,
            crop: AspectFitCropCalculator::new(),
            facing,
            matrix: TransformBuilder::build(facing),
            viewport,
            last_frame: None,
        }
    }

    /// Build the GPU pipeline up front instead of on the first draw
    pub fn initialize(&mut self, device: &wgpu::Device) -> PipelineResult<()> {
        self.pipeline.initialize(device)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if self.viewport != (width, height) {
            debug!(width, height, "Viewport changed");
            self.viewport = (width, height);
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Switch facing and rebuild the MVP
    pub fn set_facing(&mut self, facing: CameraFacing) {
        self.facing = facing;
        self.matrix = TransformBuilder::build(facing);
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn matrix(&self) -> &TransformMatrix {
        &self.matrix
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn pipeline(&self) -> &ColorConvertPipeline {
        &self.pipeline
    }

    /// Dimensions of the frames this context's textures were built for
    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        self.pipeline.textures().frame_dimensions()
    }

    /// Fresh context for frames of other dimensions.
    ///
    /// Facing, viewport and the last delivered frame carry over, so the next
    /// render redraws that frame instead of only clearing.
    pub fn rebuild(&mut self, device: &wgpu::Device) -> PipelineResult<RenderContext> {
        let mut context = RenderContext::new(self.pipeline.target_format(), self.facing, self.viewport);
        context.initialize(device)?;
        context.last_frame = self.last_frame.take();
        if let Some(frame) = &context.last_frame {
            debug!(
                width = frame.width(),
                height = frame.height(),
                "Render context rebuilt for new frame size"
            );
        }
        Ok(context)
    }

    /// Recompute the crop on the next draw (e.g. after the surface was reconfigured)
    pub fn invalidate_crop(&mut self) {
        self.crop.invalidate();
    }

    /// Drain `channel` and draw the newest frame, or redraw the last one.
    pub fn render<T: RenderTrigger>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        channel: &FrameChannel<T>,
    ) -> PipelineResult<RenderOutcome> {
        // A failed pipeline leaves the target untouched
        if self.pipeline.state() == PipelineState::Failed {
            return Err(PipelineError::Failed);
        }

        channel.take_render_request();
        let outcome = match channel.drain() {
            Some(frame) => {
                self.last_frame = Some(frame);
                RenderOutcome::NewFrame
            }
            None if self.last_frame.is_some() => RenderOutcome::StaleFrame,
            None => RenderOutcome::Cleared,
        };

        match self.last_frame.clone() {
            Some(frame) => self.draw_frame(device, queue, view, &frame)?,
            None => clear_target(device, queue, view, clear_color()),
        }
        Ok(outcome)
    }

    /// Clear and draw `frame` with the current viewport, crop and facing
    pub fn draw_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        frame: &Frame,
    ) -> PipelineResult<()> {
        let crop = self.crop.crop(frame.dimensions(), self.viewport);
        self.pipeline.set_crop(crop);

        let target = DrawTarget {
            view,
            width: self.viewport.0,
            height: self.viewport.1,
            clear: Some(clear_color()),
        };
        self.pipeline.draw(device, queue, target, &self.matrix, frame)
    }
}

/// Background behind the preview quad
pub fn clear_color() -> wgpu::Color {
    let [r, g, b, a] = preview::CLEAR_COLOR;
    wgpu::Color { r, g, b, a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx = RenderContext::new(wgpu::TextureFormat::Rgba8Unorm, CameraFacing::Front, (720, 1280));
        assert_eq!(ctx.viewport(), (720, 1280));
        assert_eq!(ctx.pipeline_state(), PipelineState::Uninitialized);
        assert_eq!(ctx.matrix(), &TransformBuilder::build(CameraFacing::Front));
        assert_eq!(ctx.frame_dimensions(), None);
    }

    #[test]
    fn test_set_facing_rebuilds_matrix() {
        let mut ctx = RenderContext::new(wgpu::TextureFormat::Rgba8Unorm, CameraFacing::Front, (720, 1280));
        ctx.set_facing(CameraFacing::Back);
        assert_eq!(ctx.facing(), CameraFacing::Back);
        assert_eq!(ctx.matrix(), &TransformBuilder::build(CameraFacing::Back));
    }

    #[test]
    fn test_invalidate_crop_keeps_settings() {
        let mut ctx = RenderContext::new(wgpu::TextureFormat::Rgba8Unorm, CameraFacing::Back, (720, 1280));
        ctx.invalidate_crop();
        assert_eq!(ctx.viewport(), (720, 1280));
        assert_eq!(ctx.facing(), CameraFacing::Back);
    }

    #[test]
    fn test_clear_color() {
        let color = clear_color();
        assert_eq!((color.r, color.g, color.b, color.a), (0.1, 0.1, 0.1, 1.0));
    }
}
