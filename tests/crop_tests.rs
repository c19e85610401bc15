// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for aspect-fit cropping

use camera_preview::render::crop::{FULL_TEX_COORDS, QUAD_POSITIONS};
use camera_preview::render::{AspectFitCropCalculator, CropState};

const SIZES: [u32; 8] = [2, 90, 240, 480, 720, 1080, 1280, 1920];

#[test]
fn test_clip_ratio_always_below_half() {
    for &iw in &SIZES {
        for &ih in &SIZES {
            for &ow in &SIZES {
                for &oh in &SIZES {
                    let crop = CropState::compute(iw, ih, ow, oh);
                    assert!(
                        (0.0..0.5).contains(&crop.clip_ratio),
                        "{}x{} -> {}x{} gave {}",
                        iw,
                        ih,
                        ow,
                        oh,
                        crop.clip_ratio
                    );
                }
            }
        }
    }
}

#[test]
fn test_equal_dimensions_do_not_clip() {
    for &w in &SIZES {
        for &h in &SIZES {
            assert_eq!(CropState::compute(w, h, w, h).clip_ratio, 0.0);
        }
    }
}

#[test]
fn test_orientation_independent() {
    for (iw, ih, ow, oh) in [(1280, 720, 1080, 1440), (640, 480, 1000, 300)] {
        assert_eq!(
            CropState::compute(iw, ih, ow, oh),
            CropState::compute(ih, iw, oh, ow)
        );
        assert_eq!(
            CropState::compute(iw, ih, ow, oh),
            CropState::compute(ih, iw, ow, oh)
        );
    }
}

#[test]
fn test_only_clipped_axis_moves() {
    let crop = CropState::compute(1280, 720, 1080, 1440);
    assert!(crop.is_clip_width);

    let coords = crop.tex_coords();
    for i in [1, 3, 5, 7] {
        assert_eq!(coords[i], FULL_TEX_COORDS[i]);
    }
    assert_eq!(coords[0], crop.clip_ratio);
    assert_eq!(coords[2], 1.0 - crop.clip_ratio);
}

#[test]
fn test_calculator_recomputes_on_change() {
    let mut calc = AspectFitCropCalculator::new();
    let first = calc.crop((1280, 720), (1080, 1440));
    assert_eq!(calc.crop((1280, 720), (1080, 1440)), first);

    let resized = calc.crop((1280, 720), (1080, 2340));
    assert_ne!(resized, first);
    assert!(!resized.is_clip_width);
}

#[test]
fn test_quad_is_full_viewport_strip() {
    assert_eq!(QUAD_POSITIONS, [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
    assert_eq!(CropState::NONE.tex_coords(), FULL_TEX_COORDS);
}
