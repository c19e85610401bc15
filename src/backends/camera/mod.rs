// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture sources
//!
//! ```text
//! ┌──────────────────────┐
//! │    CaptureSource     │  ← V4L2 device or synthetic test pattern
//! └──────────┬───────────┘
//!            │ next_frame()
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureLoopController│  ← producer thread
//! └──────────┬───────────┘
//!            │ publish()
//!            ▼
//! ┌──────────────────────┐
//! │     FrameChannel     │  → render thread
//! └──────────────────────┘
//! ```

pub mod frame_loop;
pub mod synthetic;
pub mod v4l2;

pub use frame_loop::{CaptureLoopController, LoopAction, start_preview_capture};
pub use synthetic::SyntheticSource;
pub use v4l2::{V4l2DeviceSummary, V4l2Source, list_devices};

use crate::constants::retry;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Which way the active camera faces
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, Hash)]
pub enum CameraFacing {
    /// Toward the user; preview is rotated 90°
    Front,
    /// Away from the user; preview is mirrored and rotated -90°
    #[default]
    Back,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Front => write!(f, "front"),
            CameraFacing::Back => write!(f, "back"),
        }
    }
}

/// A producer of NV21 frames with fixed dimensions
pub trait CaptureSource: Send {
    /// Human readable name for logging
    fn name(&self) -> &str;

    /// Frame dimensions for the whole session
    fn dimensions(&self) -> (u32, u32);

    /// Block until the next frame is available
    fn next_frame(&mut self) -> CaptureResult<Frame>;
}

/// Bounded, iterative retry with doubling backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: retry::DEFAULT_OPEN_ATTEMPTS,
            initial_backoff: Duration::from_millis(retry::DEFAULT_OPEN_BACKOFF_MS),
            max_backoff: retry::MAX_OPEN_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts,
            initial_backoff,
            ..Default::default()
        }
    }

    /// Wait after the given failed attempt (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Call `open` until it succeeds or `policy.attempts` are used up.
///
/// `open` receives the 1-based attempt number.
pub fn open_with_retry<S, F>(policy: &RetryPolicy, mut open: F) -> CaptureResult<S>
where
    F: FnMut(u32) -> CaptureResult<S>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match open(attempt) {
            Ok(source) => {
                if attempt > 1 {
                    info!(attempt, "Camera opened after retry");
                }
                return Ok(source);
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    let backoff = policy.backoff_after(attempt);
                    warn!(
                        attempt,
                        attempts,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Camera open failed, retrying"
                    );
                    std::thread::sleep(backoff);
                } else {
                    warn!(attempt, attempts, error = %e, "Camera open failed");
                }
            }
        }
    }

    Err(CaptureError::RetriesExhausted {
        attempts,
        last_error,
    })
}

/// Where frames come from for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A V4L2 node, or the device picked for the facing when `None`
    V4l2 { device_path: Option<String> },
    /// Moving color bars
    Synthetic,
}

/// Open the source for `facing` with `width` x `height` frames
pub fn open_source(
    spec: &SourceSpec,
    facing: CameraFacing,
    width: u32,
    height: u32,
) -> CaptureResult<Box<dyn CaptureSource>> {
    match spec {
        SourceSpec::Synthetic => Ok(Box::new(SyntheticSource::new(width, height)?)),
        SourceSpec::V4l2 { device_path } => {
            let path = match device_path {
                Some(path) => path.clone(),
                None => v4l2::device_for_facing(facing)?,
            };
            Ok(Box::new(V4l2Source::open(&path, width, height)?))
        }
    }
}
