//! Interactive four-point selection
//!
//! The operator clicks P1..P4 in a window showing the first (downsampled)
//! frame. Click accumulation lives in an explicit `PickState` rather than in
//! closure-captured mutables; the mouse callback only forwards events into
//! it, and the annotated frame is re-rendered from the state each poll.

use anyhow::Result;
use opencv::core::{Point, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// ESC, as reported by `highgui::wait_key`
pub const KEY_ESC: i32 = 27;

/// Poll interval for the selection window, in milliseconds
const POLL_MS: i32 = 20;

const WINDOW: &str = "Select P1-P4 (ESC to cancel)";
const MARKER_RADIUS: i32 = 6;

/// A clicked pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

/// Ordered accumulator of up to four clicked points. The click handler is a
/// method on this state, so it can be exercised without a window.
#[derive(Debug, Default)]
pub struct PickState {
    points: Vec<PixelPoint>,
}

impl PickState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a left click. Returns the 1-based label index (P1..P4) when
    /// the click is accepted; clicks past the fourth are ignored.
    pub fn record_click(&mut self, x: i32, y: i32) -> Option<usize> {
        if self.points.len() >= 4 {
            return None;
        }
        self.points.push(PixelPoint { x, y });
        Some(self.points.len())
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == 4
    }

    pub fn points(&self) -> &[PixelPoint] {
        &self.points
    }

    fn as_array(&self) -> Option<[PixelPoint; 4]> {
        <[PixelPoint; 4]>::try_from(self.points.as_slice()).ok()
    }
}

/// Render the collected points onto a copy of the base frame: a filled
/// circle plus a sequential label per point.
fn annotate(frame: &Mat, state: &PickState) -> Result<Mat> {
    let mut display = frame.try_clone()?;
    let color = Scalar::new(0.0, 255.0, 0.0, 0.0);

    for (i, p) in state.points().iter().enumerate() {
        imgproc::circle(
            &mut display,
            Point::new(p.x, p.y),
            MARKER_RADIUS,
            color,
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            &mut display,
            &format!("P{}", i + 1),
            Point::new(p.x + 10, p.y - 10),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            color,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(display)
}

/// Show `frame` in a selection window and collect four clicks. Returns
/// `None` if the operator presses ESC before the fourth click; cancellation
/// is not an error. The window is closed before returning.
pub fn collect_points(frame: &Mat) -> Result<Option<[PixelPoint; 4]>> {
    let state = Arc::new(Mutex::new(PickState::new()));

    highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE)?;
    let cb_state = Arc::clone(&state);
    highgui::set_mouse_callback(
        WINDOW,
        Some(Box::new(move |event, x, y, _flags| {
            if event == highgui::EVENT_LBUTTONDOWN {
                if let Some(n) = cb_state.lock().record_click(x, y) {
                    debug!("Picked P{} at ({}, {})", n, x, y);
                }
            }
        })),
    )?;

    info!("Click P1..P4 in order; ESC cancels");
    let picked = loop {
        let display = annotate(frame, &state.lock())?;
        highgui::imshow(WINDOW, &display)?;

        let key = highgui::wait_key(POLL_MS)?;
        if key == KEY_ESC {
            break None;
        }
        if let Some(points) = state.lock().as_array() {
            break Some(points);
        }
    };

    highgui::destroy_window(WINDOW)?;
    Ok(picked)
}
