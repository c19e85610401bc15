// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraFacing, RetryPolicy};
use crate::constants::{app_info, diagnostics, preview, retry};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.json";

/// Persisted preview settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 node to open; `None` picks a device for the facing
    pub device_path: Option<String>,
    /// Requested capture width
    pub preview_width: u32,
    /// Requested capture height
    pub preview_height: u32,
    /// Camera facing at startup
    pub facing: CameraFacing,
    /// Bounded camera-open attempts
    pub open_attempts: u32,
    /// Initial backoff between open attempts, doubled each retry
    pub open_backoff_ms: u64,
    /// CPU sampler period
    pub cpu_sample_interval_ms: u64,
    /// Samples per CPU running-average window
    pub cpu_average_window: usize,
    /// Frames per input-rate window
    pub fps_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_path: None,
            preview_width: preview::DEFAULT_WIDTH,
            preview_height: preview::DEFAULT_HEIGHT,
            facing: CameraFacing::default(),
            open_attempts: retry::DEFAULT_OPEN_ATTEMPTS,
            open_backoff_ms: retry::DEFAULT_OPEN_BACKOFF_MS,
            cpu_sample_interval_ms: diagnostics::DEFAULT_CPU_SAMPLE_INTERVAL_MS,
            cpu_average_window: diagnostics::DEFAULT_CPU_AVERAGE_WINDOW,
            fps_window: diagnostics::DEFAULT_FPS_WINDOW,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/camera-preview/config.json`
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_NAME).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable configuration");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self) -> AppResult<()> {
        let path = Self::path()
            .ok_or_else(|| AppError::Config("no configuration directory".to_string()))?;
        self.save_to(&path)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.open_attempts, Duration::from_millis(self.open_backoff_ms))
    }

    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_interval_ms)
    }
}
