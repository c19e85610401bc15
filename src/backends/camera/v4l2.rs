// SPDX-License-Identifier: GPL-3.0-only

//! NV21 capture from V4L2 devices
//!
//! Frames are read from a memory-mapped stream and copied out of the driver
//! buffer before they leave this module, so the buffer can be requeued
//! immediately. Drivers that pad rows (stride > width) are repacked to
//! tightly packed NV21.

use super::{CameraFacing, CaptureSource};
use crate::constants::{nv21, timing};
use crate::errors::{CaptureError, CaptureResult};
use crate::media::Frame;
use crate::media::frame::validate_nv21;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Buffers requested from the driver
const STREAM_BUFFERS: u32 = 4;

/// A capture node as reported by `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V4l2DeviceSummary {
    pub path: String,
    pub card: String,
    pub driver: String,
    pub supports_nv21: bool,
    /// Discrete NV21 frame sizes, or the stepwise bounds
    pub nv21_sizes: Vec<(u32, u32)>,
}

/// Enumerate `/dev/video*` nodes that can capture video
pub fn list_devices() -> Vec<V4l2DeviceSummary> {
    let mut paths: Vec<_> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("video"))
        })
        .collect();
    paths.sort_by_key(|path| video_index(path));

    let nv21_fourcc = v4l::FourCC::new(nv21::FOURCC);
    let mut devices = Vec::new();

    for path in paths {
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            continue;
        }

        let supports_nv21 = dev
            .enum_formats()
            .into_iter()
            .flatten()
            .any(|desc| desc.fourcc == nv21_fourcc);

        let mut nv21_sizes = Vec::new();
        if supports_nv21 {
            if let Ok(frame_sizes) = dev.enum_framesizes(nv21_fourcc) {
                for size in frame_sizes {
                    match size.size {
                        v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                            nv21_sizes.push((discrete.width, discrete.height));
                        }
                        v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                            nv21_sizes.push((step.min_width, step.min_height));
                            nv21_sizes.push((step.max_width, step.max_height));
                        }
                    }
                }
            }
        }

        let summary = V4l2DeviceSummary {
            path: path.to_string_lossy().to_string(),
            card: caps.card.clone(),
            driver: caps.driver.clone(),
            supports_nv21,
            nv21_sizes,
        };
        debug!(path = %summary.path, card = %summary.card, nv21 = supports_nv21, "Found capture device");
        devices.push(summary);
    }

    devices
}

fn video_index(path: &Path) -> u32 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("video"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

/// Device node used for `facing` when none is configured.
///
/// The first NV21-capable node is the back camera; the second, if present,
/// the front camera.
pub fn device_for_facing(facing: CameraFacing) -> CaptureResult<String> {
    let candidates: Vec<_> = list_devices().into_iter().filter(|d| d.supports_nv21).collect();
    let index = match facing {
        CameraFacing::Back => 0,
        CameraFacing::Front => 1.min(candidates.len().saturating_sub(1)),
    };
    candidates
        .into_iter()
        .nth(index)
        .map(|device| device.path)
        .ok_or_else(|| CaptureError::DeviceNotFound("no V4L2 device offers NV21".to_string()))
}

/// Copy a padded NV21 buffer into tightly packed rows
pub fn pack_rows(buf: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let (w, h, s) = (width as usize, height as usize, stride as usize);
    if s < w {
        return None;
    }
    let rows = h + h / 2;
    if buf.len() < s * (rows - 1) + w {
        return None;
    }

    let mut packed = Vec::with_capacity(nv21::frame_len(width, height));
    for row in 0..rows {
        packed.extend_from_slice(&buf[row * s..row * s + w]);
    }
    Some(packed)
}

/// Memory-mapped NV21 stream from one device
pub struct V4l2Source {
    name: String,
    width: u32,
    height: u32,
    stride: u32,
    frames: u64,
    stream: MmapStream<'static>,
    _device: Device,
}

impl V4l2Source {
    /// Open `path` and negotiate NV21 at `width` x `height`.
    ///
    /// The driver may pick a different size; the source then reports the
    /// size it actually delivers.
    pub fn open(path: &str, width: u32, height: u32) -> CaptureResult<Self> {
        info!(device_path = path, width, height, "Opening V4L2 device for NV21 capture");

        let dev = Device::with_path(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CaptureError::DeviceNotFound(path.to_string())
            } else {
                CaptureError::OpenFailed(format!("{}: {}", path, e))
            }
        })?;

        let name = dev
            .query_caps()
            .map(|caps| caps.card)
            .unwrap_or_else(|_| path.to_string());

        let nv21_fourcc = v4l::FourCC::new(nv21::FOURCC);
        let mut format = dev
            .format()
            .map_err(|e| CaptureError::OpenFailed(format!("Failed to query format: {}", e)))?;
        format.width = width;
        format.height = height;
        format.fourcc = nv21_fourcc;

        let format = dev
            .set_format(&format)
            .map_err(|e| CaptureError::OpenFailed(format!("Failed to set format: {}", e)))?;
        info!(
            width = format.width,
            height = format.height,
            stride = format.stride,
            fourcc = ?format.fourcc,
            "Set V4L2 format"
        );

        if format.fourcc != nv21_fourcc {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} delivers {:?} instead of NV21",
                path, format.fourcc
            )));
        }
        validate_nv21(
            nv21::frame_len(format.width, format.height),
            format.width,
            format.height,
        )
        .map_err(|e| CaptureError::UnsupportedFormat(e.to_string()))?;
        if (format.width, format.height) != (width, height) {
            warn!(
                requested_width = width,
                requested_height = height,
                width = format.width,
                height = format.height,
                "Driver adjusted capture size"
            );
        }

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureError::OpenFailed(format!("Failed to create buffer stream: {}", e)))?;

        info!(device = %name, "V4L2 capture stream started");

        Ok(Self {
            name,
            width: format.width,
            height: format.height,
            stride: format.stride.max(format.width),
            frames: 0,
            stream,
            _device: dev,
        })
    }
}

impl CaptureSource for V4l2Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> CaptureResult<Frame> {
        let frame_start = Instant::now();
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let frame_num = self.frames;
        self.frames += 1;

        let expected = nv21::frame_len(self.width, self.height);
        let frame = if self.stride == self.width {
            if buf.len() < expected {
                return Err(CaptureError::Stream(format!(
                    "short buffer: {} bytes, expected {}",
                    buf.len(),
                    expected
                )));
            }
            Frame::copy_from(&buf[..expected], self.width, self.height)
        } else {
            let packed = pack_rows(buf, self.width, self.height, self.stride).ok_or_else(|| {
                CaptureError::Stream(format!("short padded buffer: {} bytes", buf.len()))
            })?;
            Frame::new(packed.into(), self.width, self.height)
        }
        .map_err(|e| CaptureError::Stream(e.to_string()))?
        .with_sequence(meta.sequence as u64);

        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame_num,
                sequence = meta.sequence,
                size = buf.len(),
                elapsed_us = frame_start.elapsed().as_micros(),
                "NV21 frame captured"
            );
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rows_strips_padding() {
        // 4x2 frame: 2 luma rows + 1 chroma row, stride 6
        let buf = [
            1, 2, 3, 4, 0, 0, //
            5, 6, 7, 8, 0, 0, //
            9, 10, 11, 12, 0, 0,
        ];
        let packed = pack_rows(&buf, 4, 2, 6).unwrap();
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_pack_rows_last_row_unpadded() {
        let buf = [1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0, 9, 10, 11, 12];
        assert_eq!(pack_rows(&buf, 4, 2, 6).unwrap().len(), 12);
    }

    #[test]
    fn test_pack_rows_rejects_short() {
        assert_eq!(pack_rows(&[0u8; 10], 4, 2, 6), None);
        assert_eq!(pack_rows(&[0u8; 100], 4, 2, 2), None);
    }

    #[test]
    fn test_video_index_sorting() {
        assert_eq!(video_index(Path::new("/dev/video2")), 2);
        assert_eq!(video_index(Path::new("/dev/video10")), 10);
        assert_eq!(video_index(Path::new("/dev/video-foo")), u32::MAX);
    }

    #[test]
    fn test_missing_device() {
        match V4l2Source::open("/dev/video-does-not-exist", 640, 480) {
            Err(CaptureError::DeviceNotFound(path)) => assert!(path.contains("does-not-exist")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a missing device"),
        }
    }
}
