//! Caller-side consumers of processed frames.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};

use crate::detect::NormalizedPosition;
use crate::frame::PixelFormat;

/// Borrowed view of one processed frame, ready for upload.
#[derive(Clone, Copy, Debug)]
pub struct TextureFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

/// Receives frame pixels for display.
///
/// `resize` is called before the first upload and whenever the frame size
/// changes; `upload` once per presented frame.
pub trait TextureSink {
    fn resize(&mut self, width: u32, height: u32);
    fn upload(&mut self, frame: TextureFrame<'_>);
}

/// Receives face positions in `[0, 1]`, origin bottom-left.
pub trait PositionSink {
    fn publish(&mut self, positions: &[NormalizedPosition]);
}

/// Keeps a copy of the most recent frame.
#[derive(Debug, Default)]
pub struct LatestFrameSink {
    latest: Option<RgbImage>,
    resizes: u64,
    uploads: u64,
}

impl LatestFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&RgbImage> {
        self.latest.as_ref()
    }

    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = self
            .latest
            .as_ref()
            .ok_or_else(|| anyhow!("no frame has been presented yet"))?;
        image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

impl TextureSink for LatestFrameSink {
    fn resize(&mut self, width: u32, height: u32) {
        self.resizes += 1;
        log::debug!("LatestFrameSink: texture resized to {}x{}", width, height);
    }

    fn upload(&mut self, frame: TextureFrame<'_>) {
        let mut buffer = self.latest.take().map(RgbImage::into_raw).unwrap_or_default();
        buffer.clear();
        buffer.extend_from_slice(frame.pixels);
        match RgbImage::from_raw(frame.width, frame.height, buffer) {
            Some(image) => {
                self.latest = Some(image);
                self.uploads += 1;
            }
            None => log::warn!(
                "LatestFrameSink: {} bytes do not fill a {}x{} frame",
                frame.pixels.len(),
                frame.width,
                frame.height
            ),
        }
    }
}

/// Logs every published face position.
#[derive(Debug, Default)]
pub struct LogPositionSink {
    published: u64,
}

impl LogPositionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of positions logged so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl PositionSink for LogPositionSink {
    fn publish(&mut self, positions: &[NormalizedPosition]) {
        for (index, position) in positions.iter().enumerate() {
            log::info!("face {}: x={:.3} y={:.3}", index, position.x, position.y);
        }
        self.published += positions.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_frame_keeps_last_upload() {
        let mut sink = LatestFrameSink::new();
        let first = vec![10u8; 2 * 2 * 3];
        let second = vec![20u8; 2 * 2 * 3];
        for pixels in [&first, &second] {
            sink.upload(TextureFrame {
                width: 2,
                height: 2,
                format: PixelFormat::Rgb24,
                pixels,
            });
        }
        let latest = sink.latest().unwrap();
        assert_eq!(latest.as_raw(), &second);
        assert_eq!(sink.uploads(), 2);
    }

    #[test]
    fn mismatched_upload_is_ignored() {
        let mut sink = LatestFrameSink::new();
        sink.upload(TextureFrame {
            width: 4,
            height: 4,
            format: PixelFormat::Rgb24,
            pixels: &[0u8; 5],
        });
        assert!(sink.latest().is_none());
        assert!(sink.save_png(Path::new("unused.png")).is_err());
    }

    #[test]
    fn save_png_writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");
        let mut sink = LatestFrameSink::new();
        sink.upload(TextureFrame {
            width: 3,
            height: 2,
            format: PixelFormat::Rgb24,
            pixels: &[128u8; 3 * 2 * 3],
        });
        sink.save_png(&path)?;
        let reloaded = image::open(&path)?.to_rgb8();
        assert_eq!(reloaded.dimensions(), (3, 2));
        Ok(())
    }
}
