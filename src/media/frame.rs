// SPDX-License-Identifier: GPL-3.0-only

//! Immutable NV21 frames
//!
//! A [`Frame`] is only constructible from a buffer whose length matches its
//! dimensions, so plane splitting never sees a malformed buffer. Frame data
//! is shared through an `Arc<[u8]>`: cloning a frame for a stale redraw or
//! handing it to another thread never copies pixels.

use crate::constants::nv21;
use crate::errors::FrameError;
use std::sync::Arc;
use std::time::Instant;

/// One captured NV21 frame
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
    /// Producer-assigned sequence number (driver sequence for V4L2)
    sequence: u64,
    captured_at: Instant,
}

/// Check that `len` bytes describe a `width` x `height` NV21 frame
pub fn validate_nv21(len: usize, width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(FrameError::InvalidDimensions { width, height });
    }

    let expected = nv21::frame_len(width, height);
    if len != expected {
        return Err(FrameError::InvalidLength {
            width,
            height,
            expected,
            actual: len,
        });
    }

    Ok(())
}

impl Frame {
    /// Wrap an owned buffer, rejecting it if the length does not match
    pub fn new(data: Arc<[u8]>, width: u32, height: u32) -> Result<Self, FrameError> {
        validate_nv21(data.len(), width, height)?;
        Ok(Self {
            width,
            height,
            data,
            sequence: 0,
            captured_at: Instant::now(),
        })
    }

    /// Copy a borrowed buffer (e.g. a driver mmap buffer) into a fresh frame
    pub fn copy_from(bytes: &[u8], width: u32, height: u32) -> Result<Self, FrameError> {
        validate_nv21(bytes.len(), width, height)?;
        Self::new(Arc::from(bytes), width, height)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Whole NV21 buffer
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane, `[0, w*h)`
    #[inline]
    pub fn luma(&self) -> &[u8] {
        &self.data[..nv21::luma_len(self.width, self.height)]
    }

    /// Interleaved VU plane, `[w*h, w*h + w*h/2)`
    #[inline]
    pub fn chroma(&self) -> &[u8] {
        &self.data[nv21::luma_len(self.width, self.height)..]
    }

    /// Both planes at once
    pub fn planes(&self) -> (&[u8], &[u8]) {
        self.data.split_at(nv21::luma_len(self.width, self.height))
    }

    /// Size of the chroma plane in texels (each texel holds one V and one U byte)
    #[inline]
    pub fn chroma_dimensions(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}
