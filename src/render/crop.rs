// SPDX-License-Identifier: GPL-3.0-only

//! Aspect-fit center crop
//!
//! The frame is scaled uniformly to cover the whole viewport; whichever axis
//! has excess content is trimmed symmetrically by moving texture coordinates
//! inward. Sides are compared as (short, long) pairs, so a landscape sensor
//! feeding a portrait window is handled without caring about orientation.

/// Quad corner positions in clip space, triangle-strip order
pub const QUAD_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Uncropped texture coordinates matching [`QUAD_POSITIONS`]
pub const FULL_TEX_COORDS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

/// Symmetric trim applied to one texture-coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropState {
    /// `true` trims the horizontal axis, `false` the vertical axis
    pub is_clip_width: bool,
    /// Fraction trimmed from each end, always in `[0, 0.5)`
    pub clip_ratio: f32,
}

impl CropState {
    /// No trimming
    pub const NONE: CropState = CropState {
        is_clip_width: false,
        clip_ratio: 0.0,
    };

    /// Compute the crop for drawing an `input` sized frame into an `output` viewport.
    ///
    /// Returns [`CropState::NONE`] when any dimension is zero.
    pub fn compute(input_width: u32, input_height: u32, output_width: u32, output_height: u32) -> Self {
        if input_width == 0 || input_height == 0 || output_width == 0 || output_height == 0 {
            return Self::NONE;
        }

        let source_small = input_width.min(input_height) as f32;
        let source_big = input_width.max(input_height) as f32;
        let target_small = output_width.min(output_height) as f32;
        let target_big = output_width.max(output_height) as f32;

        let width_ratio = target_small / source_small;
        let height_ratio = target_big / source_big;

        let (is_clip_width, ratio) = if height_ratio < width_ratio {
            (true, height_ratio / width_ratio)
        } else {
            (false, width_ratio / height_ratio)
        };

        Self {
            is_clip_width,
            clip_ratio: (1.0 - ratio) / 2.0,
        }
    }

    /// Crop-adjusted texture coordinates for the four quad corners
    pub fn tex_coords(&self) -> [f32; 8] {
        let mut coords = FULL_TEX_COORDS;
        let near = self.clip_ratio;
        let far = 1.0 - self.clip_ratio;

        if self.is_clip_width {
            coords[0] = near;
            coords[4] = near;
            coords[2] = far;
            coords[6] = far;
        } else {
            coords[1] = near;
            coords[3] = near;
            coords[5] = far;
            coords[7] = far;
        }

        coords
    }
}

/// Caches the crop and recomputes it only when a dimension changes
#[derive(Debug, Clone, Default)]
pub struct AspectFitCropCalculator {
    key: Option<(u32, u32, u32, u32)>,
    state: CropState,
}

impl AspectFitCropCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crop for the given input/output pair, recomputed on change
    pub fn crop(&mut self, input: (u32, u32), output: (u32, u32)) -> CropState {
        let key = (input.0, input.1, output.0, output.1);
        if self.key != Some(key) {
            self.state = CropState::compute(input.0, input.1, output.0, output.1);
            self.key = Some(key);
            tracing::debug!(
                input_width = input.0,
                input_height = input.1,
                output_width = output.0,
                output_height = output.1,
                clip_width = self.state.is_clip_width,
                clip_ratio = self.state.clip_ratio,
                "Crop recomputed"
            );
        }
        self.state
    }

    /// Drop the cached crop so the next call recomputes
    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
