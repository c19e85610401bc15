// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_preview::constants::{app_info, bt601, nv21, retry};

#[test]
fn test_frame_length() {
    assert_eq!(nv21::frame_len(640, 480), 640 * 480 * 3 / 2);
    assert_eq!(nv21::luma_len(640, 480) * 3 / 2, nv21::frame_len(640, 480));
}

#[test]
fn test_conversion_coefficients() {
    assert_eq!(bt601::RV, 1.13983);
    assert_eq!(bt601::GU, 0.39465);
    assert_eq!(bt601::GV, 0.58060);
    assert_eq!(bt601::BU, 2.03211);
}

#[test]
fn test_backoff_cap_exceeds_initial() {
    assert!(retry::MAX_OPEN_BACKOFF.as_millis() > retry::DEFAULT_OPEN_BACKOFF_MS as u128);
}

#[test]
fn test_version_is_set() {
    assert!(!app_info::version().is_empty());
}
