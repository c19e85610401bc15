// SPDX-License-Identifier: GPL-3.0-only

//! Raw frame handling
//!
//! Camera frames arrive as NV21 (YUV 4:2:0): a full-resolution luma plane
//! followed by an interleaved VU plane at half resolution on both axes.
//!
//! # Modules
//!
//! - [`frame`]: Validated, immutable NV21 frames and plane splitting
//! - [`nv21`]: CPU reference conversion to RGB and a synthetic test pattern

pub mod frame;
pub mod nv21;

pub use frame::Frame;
pub use nv21::{convert_nv21_to_rgb, test_pattern, yuv_to_rgb};
