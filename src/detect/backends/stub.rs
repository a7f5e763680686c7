use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::FaceBox;

/// Regions smaller than this many pixels are treated as noise.
const MIN_REGION_PIXELS: u32 = 4;

/// Stub backend for tests and the synthetic camera.
///
/// Thresholds the image at the midpoint of its luma range and reports every
/// 4-connected bright region as a face. A uniform image has no faces.
#[derive(Default)]
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>> {
        let (min, max) = gray
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if gray.width() == 0 || gray.height() == 0 || min >= max {
            return Ok(Vec::new());
        }

        let level = min + (max - min) / 2;
        let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y)[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

        // Per label: min_x, min_y, max_x, max_y, pixel count.
        let mut regions: Vec<Option<(u32, u32, u32, u32, u32)>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if regions.len() <= label {
                regions.resize(label + 1, None);
            }
            let region = regions[label].get_or_insert((x, y, x, y, 0));
            region.0 = region.0.min(x);
            region.1 = region.1.min(y);
            region.2 = region.2.max(x);
            region.3 = region.3.max(y);
            region.4 += 1;
        }

        let mut faces: Vec<FaceBox> = regions
            .into_iter()
            .flatten()
            .filter(|region| region.4 >= MIN_REGION_PIXELS)
            .map(|(x0, y0, x1, y1, _)| FaceBox {
                x: x0,
                y: y0,
                width: x1 - x0 + 1,
                height: y1 - y0 + 1,
            })
            .collect();
        faces.sort_by_key(|face| (face.y, face.x));
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_squares(squares: &[(u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(64, 48, |x, y| {
            let inside = squares
                .iter()
                .any(|&(sx, sy, size)| x >= sx && x < sx + size && y >= sy && y < sy + size);
            if inside {
                Luma([200u8])
            } else {
                Luma([20u8])
            }
        })
    }

    #[test]
    fn stub_backend_finds_bright_regions_in_reading_order() -> Result<()> {
        let mut backend = StubBackend::new();
        let gray = image_with_squares(&[(40, 8, 8), (4, 8, 6), (20, 30, 10)]);

        let faces = backend.detect(&gray)?;
        assert_eq!(faces.len(), 3);
        assert_eq!(
            faces[0],
            FaceBox {
                x: 4,
                y: 8,
                width: 6,
                height: 6
            }
        );
        assert_eq!(faces[1].x, 40);
        assert_eq!(faces[2].center(), (25, 35));
        Ok(())
    }

    #[test]
    fn stub_backend_ignores_uniform_images() -> Result<()> {
        let mut backend = StubBackend::new();
        let gray = GrayImage::from_pixel(32, 32, Luma([128u8]));
        assert!(backend.detect(&gray)?.is_empty());
        Ok(())
    }

    #[test]
    fn stub_backend_drops_specks() -> Result<()> {
        let mut backend = StubBackend::new();
        let gray = image_with_squares(&[(10, 10, 1), (30, 20, 5)]);
        let faces = backend.detect(&gray)?;
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].x, 30);
        Ok(())
    }
}
