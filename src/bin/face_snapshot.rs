//! face_snapshot - capture one frame, save it as PNG, print detections as JSON.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::num::NonZeroU32;
use std::path::PathBuf;

use face_session::{CapturedFrame, NormalizedPosition, Resolution, Session, SessionConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture one frame and report the faces in it")]
struct Args {
    /// JSON or TOML session config file (default: $FACE_SESSION_CONFIG, then built-in defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device (overrides config).
    #[arg(long)]
    device: Option<String>,

    /// Face model file (overrides config).
    #[arg(long)]
    model: Option<String>,

    /// Detection downscale factor (overrides config).
    #[arg(long)]
    downscale: Option<u32>,

    /// Where to write the captured frame.
    #[arg(long, default_value = "snapshot.png")]
    output: PathBuf,

    /// Skip drawing face ellipses into the saved frame.
    #[arg(long)]
    no_annotate: bool,
}

#[derive(Serialize)]
struct SnapshotReport {
    device: String,
    backend: &'static str,
    resolution: Resolution,
    downscale: u32,
    output: PathBuf,
    frame: CapturedFrame,
    positions: Vec<NormalizedPosition>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_path(path)?,
        None => SessionConfig::load()?,
    };
    if let Some(device) = &args.device {
        config.camera.device = device.clone();
    }
    if let Some(model) = &args.model {
        config.model.path = model.clone();
    }
    if let Some(downscale) = args.downscale {
        config.detection.downscale =
            NonZeroU32::new(downscale).ok_or_else(|| anyhow!("--downscale must be >= 1"))?;
    }
    if args.no_annotate {
        config.detection.annotate = false;
    }
    config.validate()?;

    let device = config.camera.device.clone();
    let max_detections = config.detection.max_detections;
    let mut session = Session::new(config);
    let resolution = session.init()?;

    let (frame, positions) = {
        let buffer = session.detect(max_detections)?;
        let frame = buffer.to_captured();
        let positions = buffer.normalized_positions();
        buffer.release();
        (frame, positions)
    };
    session.close();

    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| anyhow!("captured frame does not match its resolution"))?;
    image
        .save_with_format(&args.output, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!(
        "face_snapshot: {} face(s), frame written to {}",
        frame.detections.len(),
        args.output.display()
    );

    let report = SnapshotReport {
        device,
        backend: session.backend_name().unwrap_or("unknown"),
        resolution,
        downscale: session.downscale().get(),
        output: args.output.clone(),
        frame,
        positions,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
