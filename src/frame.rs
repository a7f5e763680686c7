//! Captured frame representation.
//!
//! - `Frame`: packed RGB24 pixels plus dimensions and a per-session sequence number.
//! - `Resolution`: non-zero width/height pair reported by `Session::init`.
//! - `PixelFormat`: the single layout frames cross the session boundary in.
//!
//! Frame storage is reused across captures: sources write into the buffer a
//! `Frame` already owns, growing it only when the resolution grows.

use serde::Serialize;

/// Pixel layout of every frame handed out by a session.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R then G then B, rows packed without padding.
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured frame. Pixels are always `PixelFormat::Rgb24`.
#[derive(Debug, Default)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

impl Frame {
    /// Wrap existing storage (possibly empty) for the next capture.
    pub fn with_storage(data: Vec<u8>) -> Self {
        Self {
            data,
            width: 0,
            height: 0,
            sequence: 0,
        }
    }

    /// Build a frame from already packed RGB24 pixels.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> anyhow::Result<Self> {
        let expected =
            Resolution::new(width, height).pixel_count() * PixelFormat::Rgb24.bytes_per_pixel();
        if data.len() != expected {
            anyhow::bail!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
            sequence: 0,
        })
    }

    /// Resize the frame for a capture at `resolution` and return the writable pixels.
    ///
    /// Existing capacity is kept; contents are unspecified until the source writes them.
    pub fn prepare(&mut self, resolution: Resolution) -> &mut [u8] {
        let len = resolution.pixel_count() * self.format().bytes_per_pixel();
        self.data.resize(len, 0);
        self.width = resolution.width;
        self.height = resolution.height;
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgb24
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Detach the pixel storage, leaving an empty frame behind.
    pub(crate) fn take_data(&mut self) -> Vec<u8> {
        self.width = 0;
        self.height = 0;
        std::mem::take(&mut self.data)
    }
}
