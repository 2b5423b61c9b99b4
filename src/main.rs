//! topview-calibrate - interactive bird's-eye calibration for video
//!
//! Click four ground-reference points in the first frame of a video to
//! estimate a pixel-to-ground homography, then watch every subsequent frame
//! rectified into a top-down view next to the original.

mod config;
mod error;
mod homography;
mod picker;
mod video;
mod view;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;

/// Interactive four-point homography calibration for top-down video rectification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Video file to calibrate against (overrides the configured path)
    #[arg(long)]
    video: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("topview-calibrate v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_create(&args.config)?;
    if let Some(video) = args.video {
        config.video.path = video;
    }
    config.validate()?;

    run(config)
}

fn run(config: Config) -> Result<()> {
    let mut source = video::FrameSource::open(&config.video.path)?;

    // First frame must be readable before any window opens
    let first_frame = source.read_first_frame()?;
    let first_frame = video::downsample(first_frame, config.video.downsample_scale)?;

    let Some(pixel_points) = picker::collect_points(&first_frame)? else {
        info!("Selection cancelled");
        return Ok(());
    };

    // Correspondence is positional; log the pairing so the operator can
    // verify the click order matched the configured ground points.
    for (i, (p, g)) in pixel_points.iter().zip(config.ground.points.iter()).enumerate() {
        info!(
            "P{}: pixel ({}, {}) -> ground ({}, {})",
            i + 1,
            p.x,
            p.y,
            g.x,
            g.y
        );
    }

    let (h_scaled, canvas) = homography::scaled_homography(&pixel_points, &config.ground)?;
    info!("Rectified canvas: {}x{}", canvas.width, canvas.height);

    view::run(
        &mut source,
        &h_scaled,
        canvas,
        config.video.downsample_scale,
    )
}
