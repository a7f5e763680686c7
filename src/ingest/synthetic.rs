//! Synthetic camera (`stub://`).
//!
//! Renders a static scene: a dark background with a row of bright square
//! "faces". The scene is produced in BGR order, the way most capture stacks
//! deliver it, and normalised to RGB like a real device would be.
//!
//! Query parameters:
//! - `faces=N`: number of faces in the scene (default 1, at most 8)
//! - `drop_after=N`: fail every capture after N frames, simulating an unplugged camera
//! - `open=fail`: refuse to connect

use anyhow::{anyhow, bail, Context, Result};

use super::normalize::{normalize_into, SourceFormat};
use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::detect::FaceBox;
use crate::frame::{Frame, Resolution};

const MAX_SYNTHETIC_FACES: usize = 8;
const BACKGROUND_BGR: [u8; 3] = [30, 30, 30];
const FACE_BGR: [u8; 3] = [150, 180, 220];

/// Face boxes the synthetic camera draws for `count` faces at `resolution`.
///
/// Squares are one sixth of the frame height, spread evenly across the
/// horizontal centre line, with corners aligned to multiples of 8 pixels.
pub fn synthetic_face_boxes(resolution: Resolution, count: usize) -> Vec<FaceBox> {
    let size = ((resolution.height / 6) & !7).max(8);
    let count = count.min(MAX_SYNTHETIC_FACES) as u32;
    (0..count)
        .map(|k| {
            let center_x = (k + 1) * resolution.width / (count + 1);
            let left = center_x.saturating_sub(size / 2) & !7;
            let top = (resolution.height / 2).saturating_sub(size / 2) & !7;
            FaceBox {
                x: left,
                y: top,
                width: size.min(resolution.width.saturating_sub(left)),
                height: size.min(resolution.height.saturating_sub(top)),
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
struct SyntheticOptions {
    faces: usize,
    drop_after: Option<u64>,
    fail_open: bool,
}

impl SyntheticOptions {
    fn parse(device: &str) -> Result<Self> {
        let url = url::Url::parse(device)
            .with_context(|| format!("invalid synthetic camera url {}", device))?;
        let mut options = Self {
            faces: 1,
            drop_after: None,
            fail_open: false,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "faces" => {
                    options.faces = value
                        .parse()
                        .map_err(|_| anyhow!("faces must be an integer, got {}", value))?;
                }
                "drop_after" => {
                    options.drop_after = Some(
                        value
                            .parse()
                            .map_err(|_| anyhow!("drop_after must be an integer, got {}", value))?,
                    );
                }
                "open" => options.fail_open = value == "fail",
                other => log::warn!("SyntheticCamera: ignoring unknown option {}", other),
            }
        }
        Ok(options)
    }
}

pub struct SyntheticCamera {
    device: String,
    resolution: Resolution,
    options: SyntheticOptions,
    scene: Vec<u8>,
    connected: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(settings: &CameraSettings) -> Result<Self> {
        let options = SyntheticOptions::parse(&settings.device)?;
        let resolution = Resolution::new(settings.width, settings.height);
        let scene = render_scene(resolution, options.faces);
        Ok(Self {
            device: settings.device.clone(),
            resolution,
            options,
            scene,
            connected: false,
            frame_count: 0,
        })
    }
}

impl FrameSource for SyntheticCamera {
    fn connect(&mut self) -> Result<Resolution> {
        if self.options.fail_open {
            bail!("synthetic camera {} refused to open", self.device);
        }
        self.connected = true;
        log::info!(
            "SyntheticCamera: connected to {} ({})",
            self.device,
            self.resolution
        );
        Ok(self.resolution)
    }

    fn capture(&mut self, frame: &mut Frame) -> Result<()> {
        if !self.connected {
            bail!("synthetic camera {} is not connected", self.device);
        }
        if let Some(limit) = self.options.drop_after {
            if self.frame_count >= limit {
                self.connected = false;
                bail!(
                    "synthetic camera {} unplugged after {} frames",
                    self.device,
                    limit
                );
            }
        }

        let out = frame.prepare(self.resolution);
        normalize_into(
            &self.scene,
            self.resolution.width,
            self.resolution.height,
            SourceFormat::Bgr24,
            out,
        )?;
        self.frame_count += 1;
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.device.clone(),
        }
    }
}

fn render_scene(resolution: Resolution, faces: usize) -> Vec<u8> {
    let width = resolution.width as usize;
    let mut scene = BACKGROUND_BGR.repeat(resolution.pixel_count());
    for face in synthetic_face_boxes(resolution, faces) {
        for y in face.y..face.y + face.height {
            let row = y as usize * width;
            for x in face.x..face.x + face.width {
                let offset = (row + x as usize) * 3;
                scene[offset..offset + 3].copy_from_slice(&FACE_BGR);
            }
        }
    }
    scene
}
