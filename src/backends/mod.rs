// SPDX-License-Identifier: GPL-3.0-only

//! Hardware access
//!
//! - [`camera`]: NV21 capture sources and the producer thread

pub mod camera;
