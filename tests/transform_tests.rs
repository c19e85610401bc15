// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the preview MVP matrix

use camera_preview::CameraFacing;
use camera_preview::render::{TransformBuilder, TransformMatrix};

fn transform(m: &TransformMatrix, x: f32, y: f32) -> (f32, f32) {
    let out_x = m.get(0, 0) * x + m.get(0, 1) * y + m.get(0, 3);
    let out_y = m.get(1, 0) * x + m.get(1, 1) * y + m.get(1, 3);
    (out_x, out_y)
}

#[test]
fn test_matrices_are_quarter_turns() {
    for facing in [CameraFacing::Front, CameraFacing::Back] {
        let m = TransformBuilder::build(facing);
        // Every entry is exactly -1, 0 or 1
        assert!(m.0.iter().all(|v| [-1.0, 0.0, 1.0].contains(v)), "{:?}", m.0);
        // x and y swap roles
        let (x, y) = transform(&m, 1.0, 0.0);
        assert_eq!(x, 0.0);
        assert_eq!(y.abs(), 1.0);
    }
}

#[test]
fn test_quad_still_covers_viewport() {
    for facing in [CameraFacing::Front, CameraFacing::Back] {
        let m = TransformBuilder::build(facing);
        let mut corners: Vec<_> = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
            .iter()
            .map(|&(x, y)| transform(&m, x, y))
            .collect();
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(corners, vec![(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)]);
    }
}

#[test]
fn test_front_and_back_differ() {
    assert_ne!(
        TransformBuilder::build(CameraFacing::Front),
        TransformBuilder::build(CameraFacing::Back)
    );
}

#[test]
fn test_rotation_composition() {
    let mut m = TransformMatrix::IDENTITY;
    m.rotate(90.0, 0.0, 0.0, 1.0);
    m.rotate(-90.0, 0.0, 0.0, 1.0);
    assert_eq!(m, TransformMatrix::IDENTITY);
}
