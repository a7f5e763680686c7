//! Frame → detections.
//!
//! The pipeline converts the captured RGB frame to grayscale, shrinks it by
//! the session's downscale factor, equalises its histogram, hands it to the
//! backend and maps every box back to captured-frame coordinates.

use std::num::{NonZeroU32, NonZeroUsize};

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Rgb};
use imageproc::contrast::equalize_histogram_mut;
use imageproc::drawing::draw_hollow_ellipse_mut;

use super::backend::DetectorBackend;
use super::backends::{SeetaBackend, StubBackend};
use super::result::{Detection, Scale};
use crate::config::ModelSettings;
use crate::frame::Frame;

const ANNOTATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ANNOTATION_STROKE: i32 = 4;

/// Build the backend named by `settings.path`.
///
/// `stub://` paths select the bright-region stub; anything else is a SeetaFace model file.
pub fn load_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    if settings.path.starts_with("stub://") {
        return Ok(Box::new(StubBackend::new()));
    }
    Ok(Box::new(SeetaBackend::from_path(&settings.path, settings)?))
}

pub struct FaceDetector {
    backend: Box<dyn DetectorBackend>,
    equalize: bool,
}

impl FaceDetector {
    pub fn new(backend: Box<dyn DetectorBackend>, equalize: bool) -> Self {
        Self { backend, equalize }
    }

    pub fn load(settings: &ModelSettings, equalize: bool) -> Result<Self> {
        Ok(Self::new(load_backend(settings)?, equalize))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Detect at most `max` faces in `frame`, working at `1/downscale` resolution.
    ///
    /// Results keep the backend's order and are expressed in `frame` pixels.
    pub fn detect(
        &mut self,
        frame: &Frame,
        max: NonZeroUsize,
        downscale: NonZeroU32,
    ) -> Result<Vec<Detection>> {
        let gray = prepare_gray(frame, downscale, self.equalize)?;
        let found = self.backend.detect(&gray)?;
        let resolution = frame.resolution();
        let scale = Scale::between(gray.dimensions(), resolution);
        Ok(found
            .into_iter()
            .filter(|face| face.width > 0 && face.height > 0)
            .take(max.get())
            .map(|face| Detection::from_scaled_box(face, scale, resolution))
            .collect())
    }
}

/// Grayscale, downscaled and (optionally) equalised copy of `frame`.
pub fn prepare_gray(frame: &Frame, downscale: NonZeroU32, equalize: bool) -> Result<GrayImage> {
    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
        return Err(anyhow!("cannot detect on an empty frame"));
    }
    let rgb = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(width, height, frame.data())
        .ok_or_else(|| anyhow!("frame buffer too small for {}x{}", width, height))?;
    let mut gray = imageops::grayscale(&rgb);

    let factor = downscale.get();
    if factor > 1 {
        let scaled_width = (width / factor).max(1);
        let scaled_height = (height / factor).max(1);
        gray = imageops::resize(&gray, scaled_width, scaled_height, FilterType::Triangle);
    }
    if equalize {
        equalize_histogram_mut(&mut gray);
    }
    Ok(gray)
}

/// Draw an ellipse around every detection into the frame.
pub fn annotate(frame: &mut Frame, detections: &[Detection]) -> Result<()> {
    let (width, height) = (frame.width(), frame.height());
    let mut canvas = ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, frame.data_mut())
        .ok_or_else(|| anyhow!("frame buffer too small for {}x{}", width, height))?;
    for detection in detections {
        let center = (detection.x as i32, detection.y as i32);
        let rx = (detection.bounds.width / 2) as i32;
        let ry = (detection.bounds.height / 2) as i32;
        for offset in 0..ANNOTATION_STROKE {
            let grow = offset - ANNOTATION_STROKE / 2;
            draw_hollow_ellipse_mut(
                &mut canvas,
                center,
                (rx + grow).max(1),
                (ry + grow).max(1),
                ANNOTATION_COLOR,
            );
        }
    }
    Ok(())
}
