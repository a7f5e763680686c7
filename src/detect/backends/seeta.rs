use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::GrayImage;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::result::FaceBox;

/// Cascade face detector backed by `rustface` (SeetaFace funnel-structured cascade).
///
/// The model file is read once when the backend is built; every `detect` call
/// runs the cascade on the prepared grayscale image.
pub struct SeetaBackend {
    detector: Box<dyn rustface::Detector>,
}

impl SeetaBackend {
    /// Load a SeetaFace model from disk and configure the cascade.
    pub fn from_path<P: AsRef<Path>>(path: P, settings: &ModelSettings) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open face model {}", path.display()))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|err| anyhow!("invalid face model {}: {}", path.display(), err))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(settings.min_face_size);
        detector.set_score_thresh(settings.score_threshold);
        detector.set_pyramid_scale_factor(settings.pyramid_scale_factor);
        detector.set_slide_window_step(settings.window_step, settings.window_step);

        log::info!("SeetaBackend: loaded face model {}", path.display());
        Ok(Self { detector })
    }
}

impl DetectorBackend for SeetaBackend {
    fn name(&self) -> &'static str {
        "seeta"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>> {
        let (width, height) = gray.dimensions();
        let image = rustface::ImageData::new(gray.as_raw(), width, height);
        let faces = self.detector.detect(&image);

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                // The cascade may report windows that hang off the image edge.
                let x0 = (bbox.x() as i64).clamp(0, width as i64);
                let y0 = (bbox.y() as i64).clamp(0, height as i64);
                let x1 = (bbox.x() as i64 + bbox.width() as i64).clamp(0, width as i64);
                let y1 = (bbox.y() as i64 + bbox.height() as i64).clamp(0, height as i64);
                if x1 <= x0 || y1 <= y0 {
                    return None;
                }
                Some(FaceBox {
                    x: x0 as u32,
                    y: y0 as u32,
                    width: (x1 - x0) as u32,
                    height: (y1 - y0) as u32,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let err = SeetaBackend::from_path(&path, &ModelSettings::default())
            .err()
            .expect("missing model must fail");
        assert!(err.to_string().contains("absent.bin"));
    }
}
