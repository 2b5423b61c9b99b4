//! Streaming video input and frame downsampling

use anyhow::Result;
use opencv::core::Size;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::CalibrateError;

/// A video file opened for streaming decode. Frames are yielded in decode
/// order; there is no seeking. The capture handle is released when the
/// source is dropped.
#[derive(Debug)]
pub struct FrameSource {
    cap: videoio::VideoCapture,
    path: PathBuf,
}

impl FrameSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CalibrateError::VideoNotFound(path.to_path_buf()).into());
        }

        let path_str = path.to_str().ok_or_else(|| {
            anyhow::anyhow!("video path is not valid UTF-8: {}", path.display())
        })?;
        let cap = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(CalibrateError::VideoOpen(path.to_path_buf()).into());
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let fps = cap.get(videoio::CAP_PROP_FPS)?;
        info!("Opened {} ({}x{} @ {:.1}fps)", path.display(), width, height, fps);

        Ok(Self {
            cap,
            path: path.to_path_buf(),
        })
    }

    /// Read the next frame, or `None` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// Read the first frame; an empty or undecodable stream is a fatal
    /// resource error here, before any window is opened.
    pub fn read_first_frame(&mut self) -> Result<Mat> {
        self.read_frame()?
            .ok_or_else(|| CalibrateError::EmptyVideo(self.path.clone()).into())
    }
}

/// Dimensions after downsampling: `max(1, round(d * scale))` per axis.
pub fn scaled_dims(width: i32, height: i32, scale: f64) -> Result<(i32, i32), CalibrateError> {
    if !(scale > 0.0 && scale <= 1.0) {
        return Err(CalibrateError::InvalidScale(scale));
    }
    let w = ((width as f64 * scale).round() as i32).max(1);
    let h = ((height as f64 * scale).round() as i32).max(1);
    Ok((w, h))
}

/// Shrink a frame by `scale` for faster interaction; a scale of exactly 1
/// returns the frame unchanged.
pub fn downsample(frame: Mat, scale: f64) -> Result<Mat> {
    let (new_w, new_h) = scaled_dims(frame.cols(), frame.rows(), scale)?;
    if scale == 1.0 {
        return Ok(frame);
    }

    let mut resized = Mat::default();
    imgproc::resize(
        &frame,
        &mut resized,
        Size::new(new_w, new_h),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    Ok(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    #[test]
    fn test_scaled_dims() {
        assert_eq!(scaled_dims(1920, 1080, 0.25).unwrap(), (480, 270));
        assert_eq!(scaled_dims(640, 480, 0.5).unwrap(), (320, 240));
        // Rounds rather than truncates
        assert_eq!(scaled_dims(999, 999, 0.5).unwrap(), (500, 500));
    }

    #[test]
    fn test_scaled_dims_identity() {
        assert_eq!(scaled_dims(640, 480, 1.0).unwrap(), (640, 480));
    }

    #[test]
    fn test_scaled_dims_floor_of_one() {
        // Tiny frames never collapse to zero
        assert_eq!(scaled_dims(3, 3, 0.1).unwrap(), (1, 1));
        assert_eq!(scaled_dims(1, 1, 0.01).unwrap(), (1, 1));
    }

    #[test]
    fn test_scaled_dims_invalid_scale() {
        for scale in [0.0, -1.0, 1.01, 2.0] {
            assert!(
                matches!(
                    scaled_dims(640, 480, scale),
                    Err(CalibrateError::InvalidScale(_))
                ),
                "scale {} should be rejected",
                scale
            );
        }
    }

    #[test]
    fn test_downsample_resizes() {
        let frame =
            Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap();
        let out = downsample(frame, 0.25).unwrap();
        assert_eq!(out.cols(), 160);
        assert_eq!(out.rows(), 120);
    }

    #[test]
    fn test_downsample_identity_scale() {
        let frame =
            Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(7.0)).unwrap();
        let out = downsample(frame, 1.0).unwrap();
        assert_eq!(out.cols(), 640);
        assert_eq!(out.rows(), 480);
    }

    #[test]
    fn test_open_missing_video() {
        let err = FrameSource::open(Path::new("does/not/exist.mp4")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalibrateError>(),
            Some(CalibrateError::VideoNotFound(_))
        ));
    }

    #[test]
    fn test_zero_byte_video_fails_fatally() {
        // An empty file must abort while opening or on the first read,
        // before any window would be created
        let path = std::env::temp_dir().join("topview-calibrate-zero-byte.mp4");
        std::fs::write(&path, b"").unwrap();

        let result = FrameSource::open(&path).and_then(|mut source| source.read_first_frame());
        let err = result.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<CalibrateError>(),
                Some(CalibrateError::VideoOpen(_) | CalibrateError::EmptyVideo(_))
            ),
            "unexpected error: {}",
            err
        );

        std::fs::remove_file(&path).ok();
    }
}
