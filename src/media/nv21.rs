// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference path for NV21 frames
//!
//! [`yuv_to_rgb`] is the same math the preview shader runs per fragment. It
//! backs the snapshot command when no GPU adapter is available and serves as
//! the oracle for GPU readback tests.

use super::frame::Frame;
use crate::constants::bt601;
use image::RgbImage;

/// Convert one normalized sample.
///
/// `y` is luma in `[0, 1]`; `u` and `v` are already centered (`sample - 0.5`).
#[inline]
pub fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [f32; 3] {
    [
        y + bt601::RV * v,
        y - bt601::GU * u - bt601::GV * v,
        y + bt601::BU * u,
    ]
}

/// Inverse of [`yuv_to_rgb`], used to synthesize frames from RGB colors
#[inline]
pub fn rgb_to_yuv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = (b - y) / bt601::BU;
    let v = (r - y) / bt601::RV;
    [y, u, v]
}

#[inline]
fn to_unorm(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn from_unorm(value: u8) -> f32 {
    value as f32 / 255.0
}

/// Convert a whole frame; chroma is sampled nearest-neighbour.
pub fn convert_nv21_to_rgb(frame: &Frame) -> Result<RgbImage, String> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let (luma, chroma) = frame.planes();

    let mut rgb_data = vec![0u8; width * height * 3];

    for row in 0..height {
        let vu_row = &chroma[(row / 2) * width..(row / 2) * width + width];
        let y_row = &luma[row * width..row * width + width];
        let out_row = &mut rgb_data[row * width * 3..(row + 1) * width * 3];

        for col in 0..width {
            let pair = (col / 2) * 2;
            // NV21 stores V before U
            let v = from_unorm(vu_row[pair]) - bt601::CHROMA_OFFSET;
            let u = from_unorm(vu_row[pair + 1]) - bt601::CHROMA_OFFSET;
            let [r, g, b] = yuv_to_rgb(from_unorm(y_row[col]), u, v);

            out_row[col * 3] = to_unorm(r);
            out_row[col * 3 + 1] = to_unorm(g);
            out_row[col * 3 + 2] = to_unorm(b);
        }
    }

    RgbImage::from_raw(width as u32, height as u32, rgb_data)
        .ok_or_else(|| "Failed to create RGB image from buffer".to_string())
}

/// Vertical color bars, left to right
const BARS: [[f32; 3]; 8] = [
    [1.0, 1.0, 1.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, 0.0],
];

/// Build an NV21 buffer of color bars scrolled right by `phase` pixels.
///
/// `width` and `height` must be even.
pub fn test_pattern(width: u32, height: u32, phase: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let bar_width = (w / BARS.len()).max(1);
    let shift = phase as usize % w.max(1);

    let bar_at = |col: usize| BARS[((col + w - shift) % w / bar_width).min(BARS.len() - 1)];

    let mut data = vec![0u8; w * h + w * h / 2];
    let (luma, chroma) = data.split_at_mut(w * h);

    let luma_row: Vec<u8> = (0..w).map(|col| to_unorm(rgb_to_yuv(bar_at(col))[0])).collect();
    for row in luma.chunks_exact_mut(w) {
        row.copy_from_slice(&luma_row);
    }

    let mut chroma_row = vec![0u8; w];
    for pair in 0..w / 2 {
        let [_, u, v] = rgb_to_yuv(bar_at(pair * 2));
        chroma_row[pair * 2] = to_unorm(v + bt601::CHROMA_OFFSET);
        chroma_row[pair * 2 + 1] = to_unorm(u + bt601::CHROMA_OFFSET);
    }
    for row in chroma.chunks_exact_mut(w) {
        row.copy_from_slice(&chroma_row);
    }

    data
}
