//! Error type shared by the measurement pipeline and its collaborators.

use std::path::PathBuf;

/// Errors that abort the measurement of one image (or a whole run when the
/// calibration itself is unusable).
///
/// An ambiguous chamfer-edge count is a degraded measurement, not an error;
/// see [`crate::EdgeStatus::Ambiguous`].
#[derive(Debug)]
pub enum MeasureError {
    /// Image size is not one of the supported capture resolutions.
    UnsupportedResolution {
        /// Image width in pixels.
        width: u32,
        /// Image height (row count) in pixels.
        height: u32,
    },
    /// More than one bore circle matched the search window.
    AmbiguousDetection {
        /// Number of accepted circles.
        circles: usize,
    },
    /// An image could not be decoded or encoded.
    Image {
        /// File involved.
        path: PathBuf,
        /// Codec error message.
        message: String,
    },
    /// Calibration record is malformed.
    Calibration(String),
    /// Configuration file is malformed.
    Config(String),
    /// Filesystem error.
    Io(std::io::Error),
}

impl std::fmt::Display for MeasureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedResolution { width, height } => write!(
                f,
                "unsupported image size {}x{} (supported: 1600x1200 and 4096x3000)",
                width, height
            ),
            Self::AmbiguousDetection { circles } => {
                write!(f, "found {} bore circles, expected at most one", circles)
            }
            Self::Image { path, message } => {
                write!(f, "image error for {}: {}", path.display(), message)
            }
            Self::Calibration(msg) => write!(f, "invalid calibration: {}", msg),
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for MeasureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MeasureError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl MeasureError {
    pub(crate) fn image(path: impl Into<PathBuf>, err: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
