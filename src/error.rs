//! Error types for the foot pose estimation library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime session or inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image buffer conversion failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error, including incompatible model weights
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model input configuration error
    #[error("Model input error: {0}")]
    ModelInputError(String),

    /// Model output processing error
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Model data shape or format error
    #[error("Model data format error: {0}")]
    ModelDataFormatError(String),

    /// A background worker panicked or was dropped
    #[error("Background task failed: {0}")]
    TaskJoin(String),

    /// The frame source had no image to hand over
    #[error("No camera frame available")]
    CaptureUnavailable,

    /// Neural detection ran but found no candidate box
    #[error("Detector returned no bounding boxes")]
    NoDetection,

    /// Segmentation found no region above the area threshold
    #[error("No target region found (minimum area {min_area} px²)")]
    NoTargetFound {
        /// Area threshold that every candidate fell below
        min_area: f64,
    },
}

impl Error {
    /// Whether this error only aborts the current pipeline run.
    ///
    /// Recoverable errors leave the previous estimate in place and are logged
    /// at warning level; everything else indicates a broken stage.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CaptureUnavailable | Self::NoDetection | Self::NoTargetFound { .. }
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
