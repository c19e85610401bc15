// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing V4L2 capture devices
//! - Rendering a single frame to a PNG

use camera_preview::Config;
use camera_preview::app::headless::render_snapshot;
use camera_preview::backends::camera::{
    CameraFacing, SourceSpec, list_devices, open_source, open_with_retry,
};
use camera_preview::errors::{AppError, AppResult};
use camera_preview::media::{Frame, convert_nv21_to_rgb};
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, warn};

/// Frames discarded from a real camera before the snapshot (auto exposure settles)
const SNAPSHOT_WARMUP_FRAMES: usize = 5;

/// Default folder name for snapshots
const DEFAULT_SAVE_FOLDER: &str = "Camera";

/// List all V4L2 capture devices
pub fn list_cameras() -> AppResult<()> {
    let devices = list_devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for device in &devices {
        println!("  {} {} ({})", device.path, device.card, device.driver);
        if !device.supports_nv21 {
            println!("      NV21: not supported");
        } else if device.nv21_sizes.is_empty() {
            println!("      NV21: supported");
        } else {
            let mut sizes = device.nv21_sizes.clone();
            sizes.sort_by(|a, b| (b.0 * b.1).cmp(&(a.0 * a.1)));
            sizes.dedup();
            let size_strs: Vec<String> = sizes.iter().map(|(w, h)| format!("{}x{}", w, h)).collect();
            println!("      NV21: {}", size_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Parse `WIDTHxHEIGHT`
pub fn parse_viewport(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if width == 0 || height == 0 {
        return Err("viewport dimensions must be nonzero".to_string());
    }
    Ok((width, height))
}

/// Capture one frame and write it as a PNG
pub fn take_snapshot(
    config: &Config,
    source: SourceSpec,
    facing: CameraFacing,
    viewport: Option<(u32, u32)>,
    output: Option<PathBuf>,
) -> AppResult<()> {
    let frame = capture_one(config, &source, facing)?;
    let (width, height) = frame.dimensions();
    println!("Captured frame: {}x{}", width, height);

    // Frames are drawn rotated a quarter turn, so the natural target is portrait
    let viewport = viewport.unwrap_or((height, width));

    let output_path = output.unwrap_or_else(default_snapshot_path);
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(render_snapshot(&frame, viewport, facing)) {
        Ok(image) => {
            image.save(&output_path)?;
            info!(width = viewport.0, height = viewport.1, "Snapshot rendered on GPU");
        }
        Err(AppError::Gpu(e)) => {
            warn!(error = %e, "GPU unavailable, falling back to CPU conversion (no rotation or crop)");
            let image = convert_nv21_to_rgb(&frame).map_err(AppError::Other)?;
            image.save(&output_path)?;
        }
        Err(e) => return Err(e),
    }

    println!("Snapshot saved: {}", output_path.display());
    Ok(())
}

fn capture_one(config: &Config, source: &SourceSpec, facing: CameraFacing) -> AppResult<Frame> {
    let (width, height) = (config.preview_width, config.preview_height);
    let mut capture = open_with_retry(&config.retry_policy(), |_| {
        open_source(source, facing, width, height)
    })?;
    println!("Using camera: {}", capture.name());

    let warmup = match source {
        SourceSpec::V4l2 { .. } => SNAPSHOT_WARMUP_FRAMES,
        SourceSpec::Synthetic => 0,
    };
    for _ in 0..warmup {
        capture.next_frame()?;
    }
    Ok(capture.next_frame()?)
}

fn default_snapshot_path() -> PathBuf {
    let dir = dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER);
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("snapshot_{}.png", timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("720x1280"), Ok((720, 1280)));
        assert_eq!(parse_viewport("1080X1920"), Ok((1080, 1920)));
        assert!(parse_viewport("720").is_err());
        assert!(parse_viewport("0x10").is_err());
        assert!(parse_viewport("ax10").is_err());
    }

    #[test]
    fn test_default_snapshot_path() {
        let path = default_snapshot_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(path.to_string_lossy().contains(DEFAULT_SAVE_FOLDER));
    }
}
