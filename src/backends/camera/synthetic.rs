// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic NV21 source producing scrolling color bars

use super::CaptureSource;
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::frame::validate_nv21;
use crate::media::{Frame, test_pattern};
use std::time::{Duration, Instant};

pub struct SyntheticSource {
    width: u32,
    height: u32,
    period: Duration,
    sequence: u64,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        let expected = crate::constants::nv21::frame_len(width, height);
        validate_nv21(expected, width, height)
            .map_err(|e| CaptureError::UnsupportedFormat(e.to_string()))?;

        Ok(Self {
            width,
            height,
            period: timing::SYNTHETIC_FRAME_PERIOD,
            sequence: 0,
            next_due: None,
        })
    }

    /// Frame pacing; zero produces frames as fast as they are requested
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}

impl CaptureSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> CaptureResult<Frame> {
        if let Some(due) = self.next_due {
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.period);

        let phase = self.sequence.wrapping_mul(4) as u32;
        let data = test_pattern(self.width, self.height, phase);
        let frame = Frame::new(data.into(), self.width, self.height)
            .map_err(|e| CaptureError::Stream(e.to_string()))?
            .with_sequence(self.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_odd_dimensions() {
        assert!(matches!(
            SyntheticSource::new(63, 48),
            Err(CaptureError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_frames_are_sequenced() {
        let mut source = SyntheticSource::new(32, 16).unwrap().with_period(Duration::ZERO);
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();

        assert_eq!(first.dimensions(), (32, 16));
        assert_eq!(first.data().len(), 32 * 16 * 3 / 2);
        assert_eq!((first.sequence(), second.sequence()), (0, 1));
        // Bars scroll between frames
        assert_ne!(first.data(), second.data());
    }
}
