// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview application

use crate::render::textures::Plane;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for the render pipeline
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for capture backends
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Malformed frame
    Frame(FrameError),
    /// Render pipeline errors
    Pipeline(PipelineError),
    /// Camera capture errors
    Capture(CaptureError),
    /// GPU adapter/device/surface setup
    Gpu(String),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// A buffer that does not describe a valid NV21 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Zero or odd dimensions (chroma is subsampled 2x2)
    InvalidDimensions { width: u32, height: u32 },
    /// Byte length differs from width * height * 3 / 2
    InvalidLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Render pipeline errors
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// WGSL failed to compile
    ShaderCompilation(String),
    /// Bind group / pipeline layout rejected by the device
    ProgramLink(String),
    /// Plane texture already exists with other dimensions
    PlaneSizeMismatch {
        plane: Plane,
        existing: (u32, u32),
        requested: (u32, u32),
    },
    /// Plane data does not cover the texture
    PlaneDataTooShort {
        plane: Plane,
        expected: usize,
        actual: usize,
    },
    /// Validation error captured around a labelled GPU call
    Gpu { label: String, message: String },
    /// Draw issued on a pipeline that failed to initialize
    Failed,
}

/// Camera capture errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// No capture device available
    DeviceNotFound(String),
    /// Device exists but could not be opened or configured
    OpenFailed(String),
    /// Device does not deliver NV21
    UnsupportedFormat(String),
    /// Streaming failed after the device was opened
    Stream(String),
    /// Bounded acquisition retry gave up
    RetriesExhausted { attempts: u32, last_error: String },
}

impl PipelineError {
    /// Whether the pipeline can never draw again after this error.
    ///
    /// Everything else aborts only the current draw.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineError::ShaderCompilation(_) | PipelineError::ProgramLink(_) | PipelineError::Failed
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Frame(e) => write!(f, "Frame error: {}", e),
            AppError::Pipeline(e) => write!(f, "Render pipeline error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Gpu(msg) => write!(f, "GPU error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidDimensions { width, height } => {
                write!(f, "Invalid NV21 dimensions {}x{}", width, height)
            }
            FrameError::InvalidLength {
                width,
                height,
                expected,
                actual,
            } => write!(
                f,
                "NV21 frame {}x{} must be {} bytes, got {}",
                width, height, expected, actual
            ),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            PipelineError::ProgramLink(msg) => write!(f, "Pipeline link failed: {}", msg),
            PipelineError::PlaneSizeMismatch {
                plane,
                existing,
                requested,
            } => write!(
                f,
                "{} texture is {}x{}, cannot reuse for {}x{}",
                plane, existing.0, existing.1, requested.0, requested.1
            ),
            PipelineError::PlaneDataTooShort {
                plane,
                expected,
                actual,
            } => write!(
                f,
                "{} plane needs {} bytes, got {}",
                plane, expected, actual
            ),
            PipelineError::Gpu { label, message } => write!(f, "{}: {}", label, message),
            PipelineError::Failed => write!(f, "Pipeline is in failed state"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CaptureError::OpenFailed(msg) => write!(f, "Failed to open device: {}", msg),
            CaptureError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            CaptureError::Stream(msg) => write!(f, "Stream error: {}", msg),
            CaptureError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "Camera unavailable after {} attempts: {}",
                attempts, last_error
            ),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for FrameError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for CaptureError {}

impl From<FrameError> for AppError {
    fn from(err: FrameError) -> Self {
        AppError::Frame(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::OpenFailed(err.to_string())
    }
}
