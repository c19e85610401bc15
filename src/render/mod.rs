// SPDX-License-Identifier: GPL-3.0-only

//! NV21 preview rendering
//!
//! Frames cross from the capture thread through [`FrameChannel`]; everything
//! else in this module runs on the render thread.

pub mod context;
pub mod crop;
pub mod frame_channel;
pub mod pipeline;
pub mod textures;
pub mod transform;

pub use context::{RenderContext, RenderOutcome};
pub use crop::{AspectFitCropCalculator, CropState};
pub use frame_channel::{FrameChannel, PollingTrigger, RenderTrigger};
pub use pipeline::{ColorConvertPipeline, PipelineState};
pub use textures::{Plane, PlaneTextureSet, TextureSlot};
pub use transform::{TransformBuilder, TransformMatrix};
