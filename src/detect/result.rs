use serde::Serialize;

use crate::frame::Resolution;

/// Axis-aligned face bounds in pixel coordinates of the image they were found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Map a box found on the detection image back to captured-frame pixels.
    pub fn upscaled(&self, scale: Scale) -> Self {
        Self {
            x: scale_axis(self.x, scale.x),
            y: scale_axis(self.y, scale.y),
            width: scale_axis(self.width, scale.x),
            height: scale_axis(self.height, scale.y),
        }
    }

    /// Clip the box to the frame; the origin always ends up inside it.
    pub fn clipped(&self, resolution: Resolution) -> Self {
        let x = self.x.min(resolution.width.saturating_sub(1));
        let y = self.y.min(resolution.height.saturating_sub(1));
        Self {
            x,
            y,
            width: self.width.min(resolution.width - x),
            height: self.height.min(resolution.height - y),
        }
    }
}

/// Captured-frame pixels per detection-image pixel, per axis.
///
/// Detection images have floored dimensions (at least 1), so the ratio is
/// only equal to the downscale factor when the factor divides the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub fn uniform(factor: u32) -> Self {
        Self {
            x: factor as f32,
            y: factor as f32,
        }
    }

    /// Ratio from a `detected` (width, height) image to the `captured` frame.
    pub fn between(detected: (u32, u32), captured: Resolution) -> Self {
        Self {
            x: captured.width as f32 / detected.0.max(1) as f32,
            y: captured.height as f32 / detected.1.max(1) as f32,
        }
    }
}

fn scale_axis(value: u32, scale: f32) -> u32 {
    (value as f32 * scale).round() as u32
}

/// One detected face, in captured-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Circle center.
    pub x: u32,
    pub y: u32,
    /// Half the face width.
    pub radius: u32,
    pub bounds: FaceBox,
}

impl Detection {
    /// Build a detection from a box found on the detection image.
    ///
    /// The center is computed at detection resolution and then scaled, so the
    /// reported coordinates stay on the detector's grid.
    pub fn from_scaled_box(found: FaceBox, scale: Scale, resolution: Resolution) -> Self {
        let (cx, cy) = found.center();
        Self {
            x: scale_axis(cx, scale.x).min(resolution.width.saturating_sub(1)),
            y: scale_axis(cy, scale.y).min(resolution.height.saturating_sub(1)),
            radius: scale_axis(found.width / 2, scale.x),
            bounds: found.upscaled(scale).clipped(resolution),
        }
    }

    /// Position in `[0, 1]` with the origin at the bottom-left of the frame.
    pub fn normalized(&self, resolution: Resolution) -> NormalizedPosition {
        NormalizedPosition {
            x: self.x as f32 / resolution.width as f32,
            y: 1.0 - self.y as f32 / resolution.height as f32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_box_maps_back_to_full_resolution() {
        let found = FaceBox {
            x: 10,
            y: 20,
            width: 16,
            height: 12,
        };
        let detection = Detection::from_scaled_box(found, Scale::uniform(4), Resolution::new(640, 480));
        assert_eq!((detection.x, detection.y), (72, 104));
        assert_eq!(detection.radius, 32);
        assert_eq!(
            detection.bounds,
            FaceBox {
                x: 40,
                y: 80,
                width: 64,
                height: 48
            }
        );
    }

    #[test]
    fn coordinates_are_clamped_inside_frame() {
        let found = FaceBox {
            x: 150,
            y: 110,
            width: 20,
            height: 20,
        };
        let resolution = Resolution::new(640, 480);
        let detection = Detection::from_scaled_box(found, Scale::uniform(4), resolution);
        assert!(detection.x < resolution.width);
        assert!(detection.y < resolution.height);
        assert!(detection.bounds.x + detection.bounds.width <= resolution.width);
        assert!(detection.bounds.y + detection.bounds.height <= resolution.height);
    }

    #[test]
    fn uneven_downscale_uses_true_ratio() {
        // 20 / 3 floors to a 6x6 detection image.
        let resolution = Resolution::new(20, 20);
        let scale = Scale::between((6, 6), resolution);
        let found = FaceBox {
            x: 2,
            y: 2,
            width: 4,
            height: 4,
        };
        let detection = Detection::from_scaled_box(found, scale, resolution);
        assert_eq!((detection.x, detection.y), (13, 13));
        assert_eq!(detection.radius, 7);
        assert_eq!(detection.bounds.x + detection.bounds.width, 20);
    }

    #[test]
    fn normalized_position_has_bottom_left_origin() {
        let detection = Detection {
            x: 320,
            y: 120,
            radius: 10,
            bounds: FaceBox {
                x: 310,
                y: 110,
                width: 20,
                height: 20,
            },
        };
        let position = detection.normalized(Resolution::new(640, 480));
        assert_eq!(position.x, 0.5);
        assert_eq!(position.y, 0.75);
    }
}
