// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camera_preview::Config;
use camera_preview::backends::camera::CameraFacing;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.device_path, None);
    assert_eq!((config.preview_width, config.preview_height), (1280, 720));
    assert_eq!(config.facing, CameraFacing::Back);
    assert_eq!(config.open_attempts, 5);
    assert_eq!(config.cpu_average_window, 5);
    assert_eq!(config.fps_window, 30);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        device_path: Some("/dev/video2".to_string()),
        facing: CameraFacing::Front,
        preview_width: 640,
        preview_height: 480,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "facing": "Front", "fps_window": 10 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.facing, CameraFacing::Front);
    assert_eq!(config.fps_window, 10);
    assert_eq!(config.preview_width, 1280);
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_retry_policy_from_config() {
    let config = Config {
        open_attempts: 3,
        open_backoff_ms: 50,
        ..Config::default()
    };
    let policy = config.retry_policy();
    assert_eq!(policy.attempts, 3);
    assert_eq!(policy.backoff_after(1), Duration::from_millis(50));
    assert_eq!(policy.backoff_after(2), Duration::from_millis(100));
}
