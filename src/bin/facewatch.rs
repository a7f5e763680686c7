//! facewatch - run a face session and log face positions every tick.
//!
//! This binary:
//! 1. Loads the session config (file, environment, command line)
//! 2. Drives the poll loop at the camera's target frame rate
//! 3. Reconnects with backoff when the camera goes away
//! 4. Optionally writes the last good frame as PNG on exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use face_session::{
    LatestFrameSink, LogPositionSink, PollLoop, Session, SessionConfig, TickOutcome,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect faces from a camera and log their positions")]
struct Args {
    /// JSON or TOML session config file (default: $FACE_SESSION_CONFIG, then built-in defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device (overrides config), e.g. /dev/video0 or stub://camera?faces=2.
    #[arg(long)]
    device: Option<String>,

    /// Face model file (overrides config), or stub://faces.
    #[arg(long)]
    model: Option<String>,

    /// Detection downscale factor (overrides config).
    #[arg(long)]
    downscale: Option<u32>,

    /// Maximum faces reported per frame (overrides config).
    #[arg(long)]
    max_faces: Option<usize>,

    /// Stop after this many presented frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Write the last presented frame to this PNG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let frame_interval = Duration::from_secs(1) / config.camera.target_fps.max(1);
    log::info!(
        "facewatch: camera {} at {}x{}, model {}, {} fps",
        config.camera.device,
        config.camera.width,
        config.camera.height,
        config.model.path,
        config.camera.target_fps
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut poll = PollLoop::new(Session::new(config));
    let mut textures = LatestFrameSink::new();
    let mut positions = LogPositionSink::new();
    let mut presented = 0u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match poll.tick_at(started, &mut textures, &mut positions) {
            TickOutcome::Presented { resized: true, .. } => {
                presented += 1;
                if let Some(resolution) = poll.session().resolution() {
                    log::info!("facewatch: presenting {} frames", resolution);
                }
            }
            TickOutcome::Presented { .. } => presented += 1,
            TickOutcome::Reconnecting { retry_in } => {
                log::warn!("facewatch: camera unavailable, retrying in {:?}", retry_in);
            }
            TickOutcome::Waiting => {}
            TickOutcome::Halted => {
                log::error!("facewatch: face model unavailable, stopping");
                break;
            }
        }
        if args.frames.is_some_and(|limit| presented >= limit) {
            break;
        }
        if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    let mut session = poll.into_session();
    session.close();
    let stats = session.stats();
    log::info!(
        "facewatch: {} frames, {} faces, {} connects, {} device errors",
        stats.frames_processed,
        stats.faces_reported,
        stats.connects,
        stats.device_errors
    );

    if let Some(path) = &args.snapshot {
        textures.save_png(path)?;
        log::info!("facewatch: last frame written to {}", path.display());
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<SessionConfig> {
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
    if let Some(max_faces) = args.max_faces {
        config.detection.max_detections =
            NonZeroUsize::new(max_faces).ok_or_else(|| anyhow!("--max-faces must be >= 1"))?;
    }
    config.validate()?;
    Ok(config)
}
