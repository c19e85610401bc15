// SPDX-License-Identifier: GPL-3.0-only

//! Camera input frame-rate meter

use super::WindowedAverage;
use super::cpu_sampler::CpuReadings;
use std::time::Instant;
use tracing::info;

/// Averages inter-frame intervals over a window and reports the input rate.
///
/// At the end of each window the rate is logged together with the CPU
/// sampler's readings, if one is attached.
#[derive(Debug)]
pub struct FrameStats {
    intervals_ms: WindowedAverage,
    last_frame_at: Option<Instant>,
    last_fps: Option<f64>,
    cpu: Option<CpuReadings>,
}

impl FrameStats {
    pub fn new(window: usize) -> Self {
        Self {
            intervals_ms: WindowedAverage::new(window),
            last_frame_at: None,
            last_fps: None,
            cpu: None,
        }
    }

    pub fn with_cpu(mut self, cpu: CpuReadings) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Record a frame arrival; returns the input rate when a window completes
    pub fn record(&mut self, at: Instant) -> Option<f64> {
        let previous = self.last_frame_at.replace(at);
        let interval = at.duration_since(previous?).as_secs_f64() * 1000.0;

        let mean_ms = self.intervals_ms.push(interval)?;
        if mean_ms <= 0.0 {
            return None;
        }

        let fps = 1000.0 / mean_ms;
        self.last_fps = Some(fps);

        match &self.cpu {
            Some(cpu) => info!(
                fps = %format!("{:.1}", fps),
                cpu_percent = %cpu.current(),
                cpu_average_percent = %cpu.average(),
                "Camera input rate"
            ),
            None => info!(fps = %format!("{:.1}", fps), "Camera input rate"),
        }

        Some(fps)
    }

    /// Rate from the last complete window
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    /// Forget the previous arrival, e.g. after the source was reopened
    pub fn reset(&mut self) {
        self.last_frame_at = None;
        self.intervals_ms.reset();
    }
}
