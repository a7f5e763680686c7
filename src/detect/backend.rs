use anyhow::Result;
use image::GrayImage;

use super::result::FaceBox;

/// Face detector backend.
///
/// Backends see the grayscale image the detection pipeline prepared (already
/// downscaled and equalised) and report boxes in that image's coordinates.
/// Mapping back to the captured resolution is the pipeline's job.
///
/// Backends keep nothing between calls except their loaded model, so equal
/// inputs give equal outputs.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Find faces, in the backend's own order.
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>>;
}
