//! Error taxonomy for the calibration run
//!
//! Every variant is fatal: the tool is single-shot and operator-attended, so
//! nothing is retried. User cancellation is not an error and is represented
//! as an `Ok(None)` from the point picker instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrateError {
    /// Configuration: downsample scale outside (0, 1].
    #[error("downsample scale must be within (0, 1], got {0}")]
    InvalidScale(f64),

    /// Configuration: the rectified canvas needs a positive width.
    #[error("target canvas width must be positive")]
    InvalidTargetWidth,

    /// Configuration: the ground-plane quad collapses to a line or a point.
    #[error("ground plane points must span non-zero width and height")]
    DegenerateGroundPlane,

    /// Configuration: three or more of the clicked points are collinear, so
    /// the homography estimate would be degenerate.
    #[error("clicked pixel points contain a collinear triple; pick four points spanning a quad")]
    CollinearPixelPoints,

    /// Resource: the configured video path does not exist.
    #[error("video not found: {0:?}")]
    VideoNotFound(PathBuf),

    /// Resource: the decoder refused the file.
    #[error("failed to open video: {0:?}")]
    VideoOpen(PathBuf),

    /// Resource: the stream yielded no readable first frame.
    #[error("unable to read first frame from {0:?}")]
    EmptyVideo(PathBuf),
}
