// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// NV21 buffer layout
pub mod nv21 {
    /// FourCC advertised by V4L2 drivers for NV21 (Y plane, then interleaved VU)
    pub const FOURCC: &[u8; 4] = b"NV21";

    /// Total buffer size for a `width` x `height` NV21 frame
    #[inline]
    pub const fn frame_len(width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        luma + luma / 2
    }

    /// Size of the full-resolution luma plane
    #[inline]
    pub const fn luma_len(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }
}

/// YUV to RGB conversion coefficients shared by the shader and the CPU path
pub mod bt601 {
    /// R = Y + RV * V
    pub const RV: f32 = 1.13983;
    /// G = Y - GU * U - GV * V
    pub const GU: f32 = 0.39465;
    pub const GV: f32 = 0.58060;
    /// B = Y + BU * U
    pub const BU: f32 = 2.03211;
    /// Chroma samples are centered on this value
    pub const CHROMA_OFFSET: f32 = 0.5;
}

/// Preview defaults
pub mod preview {
    /// Requested capture width
    pub const DEFAULT_WIDTH: u32 = 1280;
    /// Requested capture height
    pub const DEFAULT_HEIGHT: u32 = 720;
    /// Initial window size (logical pixels)
    pub const WINDOW_WIDTH: u32 = 720;
    pub const WINDOW_HEIGHT: u32 = 1280;
    /// Surface clear color before the quad is drawn
    pub const CLEAR_COLOR: [f64; 4] = [0.1, 0.1, 0.1, 1.0];
}

/// Camera acquisition retry policy
pub mod retry {
    use super::Duration;

    /// Attempts before acquisition is reported as failed
    pub const DEFAULT_OPEN_ATTEMPTS: u32 = 5;
    /// Delay before the second attempt; doubled after each failure
    pub const DEFAULT_OPEN_BACKOFF_MS: u64 = 200;
    /// Upper bound for the doubled delay
    pub const MAX_OPEN_BACKOFF: Duration = Duration::from_secs(2);
}

/// Diagnostics sampling
pub mod diagnostics {
    /// CPU sampler period
    pub const DEFAULT_CPU_SAMPLE_INTERVAL_MS: u64 = 1000;
    /// Samples per CPU running-average window
    pub const DEFAULT_CPU_AVERAGE_WINDOW: usize = 5;
    /// Frames per input frame-rate window
    pub const DEFAULT_FPS_WINDOW: usize = 30;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Log every Nth captured frame at debug level
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// GPU upload time above which a stutter warning is logged
    pub const SLOW_UPLOAD: Duration = Duration::from_millis(16);

    /// Pause after a failed dequeue before retrying
    pub const CAPTURE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

    /// Synthetic source frame period (~30 fps)
    pub const SYNTHETIC_FRAME_PERIOD: Duration = Duration::from_millis(33);
}

/// Application information utilities
pub mod app_info {
    /// Application name used for the config directory and window title
    pub const APP_NAME: &str = "camera-preview";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("PREVIEW_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv21_lengths() {
        assert_eq!(nv21::frame_len(1280, 720), 1_382_400);
        assert_eq!(nv21::luma_len(1280, 720), 921_600);
        assert_eq!(nv21::frame_len(2, 2), 6);
    }

    #[test]
    fn test_backoff_cap_exceeds_initial_delay() {
        assert!(retry::MAX_OPEN_BACKOFF > Duration::from_millis(retry::DEFAULT_OPEN_BACKOFF_MS));
    }
}
