// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for NV21 to RGB conversion

use camera_preview::Frame;
use camera_preview::media::{convert_nv21_to_rgb, test_pattern, yuv_to_rgb};
use camera_preview::render::pipeline::PREVIEW_SHADER;

#[test]
fn test_preview_shader_is_valid_wgsl() {
    let module = naga::front::wgsl::parse_str(PREVIEW_SHADER).expect("shader parses");
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .expect("shader validates");

    let entry_points: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
    assert!(entry_points.contains(&"vs_main"));
    assert!(entry_points.contains(&"fs_main"));
}

#[test]
fn test_neutral_chroma_is_gray() {
    for y in [0.0, 0.25, 0.5, 1.0] {
        let [r, g, b] = yuv_to_rgb(y, 0.0, 0.0);
        assert_eq!((r, g, b), (y, y, y));
    }
}

#[test]
fn test_chroma_channel_order() {
    // NV21 puts V first: a frame with a high first chroma byte is red
    let (w, h) = (4u32, 2u32);
    let mut data = vec![128u8; (w * h) as usize];
    for _ in 0..(w * h / 4) {
        data.push(230); // V
        data.push(128); // U
    }
    let frame = Frame::new(data.into(), w, h).unwrap();
    let image = convert_nv21_to_rgb(&frame).unwrap();
    let [r, g, b] = image.get_pixel(0, 0).0;
    assert!(r > g && r > b, "expected red, got {:?}", (r, g, b));
}

#[test]
fn test_pattern_frame_converts() {
    let (w, h) = (160u32, 90u32);
    let frame = Frame::new(test_pattern(w, h, 0).into(), w, h).unwrap();
    let image = convert_nv21_to_rgb(&frame).unwrap();
    assert_eq!(image.dimensions(), (w, h));

    // Leftmost bar is white, rightmost black
    let left = image.get_pixel(2, 45).0;
    let right = image.get_pixel(w - 3, 45).0;
    assert!(left.iter().all(|&c| c > 240), "{:?}", left);
    assert!(right.iter().all(|&c| c < 15), "{:?}", right);
}
