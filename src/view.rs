//! Live side-by-side rectified view
//!
//! Warps every remaining frame through the composed homography into the
//! rectified canvas, resizes the result back to the frame's own size, and
//! shows original and top-down views next to each other until the stream
//! ends or the operator presses ESC.

use anyhow::Result;
use nalgebra::Matrix3;
use opencv::core::{self, Scalar, Size};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use tracing::info;

use crate::homography::Canvas;
use crate::picker::KEY_ESC;
use crate::video::{downsample, FrameSource};

const WINDOW: &str = "Original (left) | Top-Down (right)";

/// Convert the composed homography into the 3x3 CV_64F matrix the warp
/// expects.
fn warp_matrix(h: &Matrix3<f64>) -> Result<Mat> {
    let rows: [[f64; 3]; 3] = [
        [h[(0, 0)], h[(0, 1)], h[(0, 2)]],
        [h[(1, 0)], h[(1, 1)], h[(1, 2)]],
        [h[(2, 0)], h[(2, 1)], h[(2, 2)]],
    ];
    Ok(Mat::from_slice_2d(&rows)?)
}

/// Stream the remaining frames, rendering each next to its rectified
/// counterpart. Returns when the stream ends or on ESC.
pub fn run(
    source: &mut FrameSource,
    h_scaled: &Matrix3<f64>,
    canvas: Canvas,
    downsample_scale: f64,
) -> Result<()> {
    let h_mat = warp_matrix(h_scaled)?;
    let canvas_size = Size::new(canvas.width as i32, canvas.height as i32);

    highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE)?;

    let mut frames: u64 = 0;
    while let Some(frame) = source.read_frame()? {
        let frame = downsample(frame, downsample_scale)?;

        let mut bird_view = Mat::default();
        imgproc::warp_perspective(
            &frame,
            &mut bird_view,
            &h_mat,
            canvas_size,
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            Scalar::default(),
        )?;

        // Match the original frame's size for the side-by-side composite
        let mut bird_resized = Mat::default();
        imgproc::resize(
            &bird_view,
            &mut bird_resized,
            frame.size()?,
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut composite = Mat::default();
        core::hconcat2(&frame, &bird_resized, &mut composite)?;
        highgui::imshow(WINDOW, &composite)?;
        frames += 1;

        if highgui::wait_key(1)? == KEY_ESC {
            info!("Stopped by operator after {} frames", frames);
            break;
        }
    }

    info!("Rendered {} rectified frames", frames);
    highgui::destroy_all_windows()?;
    Ok(())
}
