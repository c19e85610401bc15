// SPDX-License-Identifier: GPL-3.0-only

//! Model-view-projection matrix for the preview quad
//!
//! Sensors are mounted a quarter turn off the display orientation, and the
//! front and back sensors are flipped relative to each other. The quad is
//! rotated to compensate. Matrices are stored column-major, the layout WGSL uniforms
//! expect, and [`TransformMatrix::rotate`] post-multiplies (`m = m * R`).

use crate::backends::camera::CameraFacing;

/// 4x4 column-major matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix(pub [f32; 16]);

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformMatrix {
    pub const IDENTITY: TransformMatrix = TransformMatrix([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Element at `row`, `col`
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// `self * rhs`
    pub fn multiply(&self, rhs: &TransformMatrix) -> TransformMatrix {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.get(row, k) * rhs.get(k, col)).sum();
            }
        }
        TransformMatrix(out)
    }

    /// Rotation of `degrees` about the axis `(x, y, z)`; the axis is normalized.
    pub fn rotation(degrees: f32, x: f32, y: f32, z: f32) -> TransformMatrix {
        let len = (x * x + y * y + z * z).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (x, y, z) = (x / len, y / len, z / len);

        let radians = (degrees as f64).to_radians();
        let s = snap(radians.sin());
        let c = snap(radians.cos());
        let nc = 1.0 - c;

        TransformMatrix([
            x * x * nc + c,
            y * x * nc + z * s,
            x * z * nc - y * s,
            0.0,
            x * y * nc - z * s,
            y * y * nc + c,
            y * z * nc + x * s,
            0.0,
            x * z * nc + y * s,
            y * z * nc - x * s,
            z * z * nc + c,
            0.0,
            0.0,
            0.0,
            0.0,
            1.0,
        ])
    }

    /// Apply a rotation after the current transform (`self = self * R`)
    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        *self = self.multiply(&Self::rotation(degrees, x, y, z));
    }

    /// Columns for a `mat4x4<f32>` uniform
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let m = &self.0;
        [
            [m[0], m[1], m[2], m[3]],
            [m[4], m[5], m[6], m[7]],
            [m[8], m[9], m[10], m[11]],
            [m[12], m[13], m[14], m[15]],
        ]
    }
}

/// Quarter-turn angles produce exact zeros and ones
#[inline]
fn snap(value: f64) -> f32 {
    if value.abs() < 1e-9 {
        0.0
    } else if (value.abs() - 1.0).abs() < 1e-9 {
        value.signum() as f32
    } else {
        value as f32
    }
}

/// Builds the preview MVP for the active camera
pub struct TransformBuilder;

impl TransformBuilder {
    /// Fresh identity rotated for the sensor facing
    pub fn build(facing: CameraFacing) -> TransformMatrix {
        let mut matrix = TransformMatrix::IDENTITY;
        match facing {
            CameraFacing::Front => {
                matrix.rotate(90.0, 0.0, 0.0, 1.0);
            }
            CameraFacing::Back => {
                matrix.rotate(180.0, 0.0, 1.0, 0.0);
                matrix.rotate(-90.0, 0.0, 0.0, 1.0);
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(m: &TransformMatrix, p: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (row, value) in out.iter_mut().enumerate() {
            *value = (0..4).map(|k| m.get(row, k) * p[k]).sum();
        }
        out
    }

    #[test]
    fn test_front_matrix() {
        let m = TransformBuilder::build(CameraFacing::Front);
        assert_eq!(
            m.0,
            [
                0.0, 1.0, 0.0, 0.0, //
                -1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0
            ]
        );
    }

    #[test]
    fn test_back_matrix() {
        let m = TransformBuilder::build(CameraFacing::Back);
        assert_eq!(
            m.0,
            [
                0.0, -1.0, 0.0, 0.0, //
                -1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, -1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0
            ]
        );
    }

    #[test]
    fn test_front_rotates_quad_corner() {
        // Bottom-left corner ends up bottom-right
        let m = TransformBuilder::build(CameraFacing::Front);
        assert_eq!(apply(&m, [-1.0, -1.0, 0.0, 1.0]), [1.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_back_is_vertical_flip_of_front() {
        // Back differs from front by a vertical flip of the output
        let front = TransformBuilder::build(CameraFacing::Front);
        let back = TransformBuilder::build(CameraFacing::Back);
        for corner in [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]] {
            let f = apply(&front, [corner[0], corner[1], 0.0, 1.0]);
            let b = apply(&back, [corner[0], corner[1], 0.0, 1.0]);
            assert_eq!(f[0], b[0]);
            assert_eq!(f[1], -b[1]);
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            TransformBuilder::build(CameraFacing::Back),
            TransformBuilder::build(CameraFacing::Back)
        );
    }

    #[test]
    fn test_identity_multiply() {
        let r = TransformMatrix::rotation(30.0, 1.0, 1.0, 0.0);
        assert_eq!(r.multiply(&TransformMatrix::IDENTITY), r);
        assert_eq!(TransformMatrix::IDENTITY.multiply(&r), r);
    }

    #[test]
    fn test_cols_layout() {
        let m = TransformBuilder::build(CameraFacing::Front);
        let cols = m.to_cols_array_2d();
        assert_eq!(cols[0], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(cols[1], [-1.0, 0.0, 0.0, 0.0]);
    }
}
