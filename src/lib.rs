// SPDX-License-Identifier: GPL-3.0-only

//! Camera Preview - live NV21 camera preview rendered on the GPU
//!
//! # Architecture
//!
//! - [`backends`]: capture sources (V4L2, synthetic) and the producer thread
//! - [`render`]: frame handoff, crop, transform, plane textures and the
//!   YUV to RGB pipeline
//! - [`app`]: preview window and offscreen rendering
//! - [`diagnostics`]: CPU usage and input frame rate
//! - [`media`]: validated NV21 frames and the CPU reference conversion
//! - [`config`]: user configuration handling

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod render;

// Re-export commonly used types
pub use backends::camera::CameraFacing;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use media::Frame;
pub use render::{FrameChannel, RenderContext};
