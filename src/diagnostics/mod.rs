// SPDX-License-Identifier: GPL-3.0-only

//! Runtime diagnostics: process CPU usage and camera input frame rate

pub mod cpu_sampler;
pub mod frame_stats;

pub use cpu_sampler::{CpuReadings, CpuSampler};
pub use frame_stats::FrameStats;

/// Mean over a fixed number of samples, restarted after each window
#[derive(Debug, Clone)]
pub struct WindowedAverage {
    window: usize,
    count: usize,
    mean: f64,
}

impl WindowedAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            count: 0,
            mean: 0.0,
        }
    }

    /// Add a sample; returns the window mean when this sample completes it
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;

        if self.count < self.window {
            return None;
        }

        let mean = self.mean;
        self.reset();
        Some(mean)
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
    }

    /// Samples in the current, incomplete window
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_once_per_window() {
        let mut avg = WindowedAverage::new(3);
        assert_eq!(avg.push(1.0), None);
        assert_eq!(avg.push(2.0), None);
        assert_eq!(avg.push(6.0), Some(3.0));
        assert!(avg.is_empty());

        // Next window starts from scratch
        assert_eq!(avg.push(10.0), None);
        assert_eq!(avg.len(), 1);
    }

    #[test]
    fn test_zero_window_is_one() {
        let mut avg = WindowedAverage::new(0);
        assert_eq!(avg.window(), 1);
        assert_eq!(avg.push(4.0), Some(4.0));
    }
}
