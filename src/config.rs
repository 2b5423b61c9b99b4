//! Configuration for the calibration run
//!
//! The original workflow hard-coded the video path, downsample scale, and
//! ground reference points. Here they live in an explicit `Config` structure
//! loaded from TOML, so tests and operators can substitute values without
//! touching process-wide state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CalibrateError;

/// A 2D ground-plane reference point, in arbitrary real-world units
/// (e.g. meters).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GroundPoint {
    pub x: f64,
    pub y: f64,
}

impl GroundPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Video input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Path to the video file to calibrate against
    pub path: PathBuf,
    /// Downsample factor in (0, 1] applied to every frame before display;
    /// 1.0 disables downsampling
    pub downsample_scale: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dataset/Real/fall/video1.mp4"),
            downsample_scale: 0.25,
        }
    }
}

/// Ground-plane settings: the four reference coordinates the operator's
/// clicks correspond to, in click order (P1..P4), plus the width of the
/// rectified output canvas in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundConfig {
    /// Real-world coordinates of P1..P4, matched to clicks by position
    pub points: [GroundPoint; 4],
    /// Width of the rectified canvas; height follows the ground aspect ratio
    pub target_width: u32,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            points: [
                GroundPoint::new(0.0, 0.0),
                GroundPoint::new(3.0, 0.0),
                GroundPoint::new(0.0, 3.0),
                GroundPoint::new(0.8, 3.0),
            ],
            target_width: 600,
        }
    }
}

impl GroundConfig {
    /// Axis-aligned bounding box of the ground points as
    /// (min_x, min_y, width, height).
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let xs = self.points.iter().map(|p| p.x);
        let ys = self.points.iter().map(|p| p.y);
        let min_x = xs.clone().fold(f64::INFINITY, f64::min);
        let max_x = xs.fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.clone().fold(f64::INFINITY, f64::min);
        let max_y = ys.fold(f64::NEG_INFINITY, f64::max);
        (min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub ground: GroundConfig,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CalibrateError> {
        let scale = self.video.downsample_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(CalibrateError::InvalidScale(scale));
        }
        if self.ground.target_width == 0 {
            return Err(CalibrateError::InvalidTargetWidth);
        }
        let (_, _, width, height) = self.ground.bounding_box();
        if width <= 0.0 || height <= 0.0 {
            return Err(CalibrateError::DegenerateGroundPlane);
        }
        Ok(())
    }
}
