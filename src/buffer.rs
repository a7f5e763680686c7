//! Single-owner handoff of one processed frame and its detections.
//!
//! A `ResultBuffer` mutably borrows the session that produced it. While it is
//! alive the session cannot capture again, and releasing it consumes the
//! value, so the storage-reuse contract holds by construction:
//!
//! ```compile_fail
//! # use face_session::{Session, SessionConfig};
//! # use std::num::NonZeroUsize;
//! # fn demo(session: &mut Session) -> Result<(), face_session::SessionError> {
//! let max = NonZeroUsize::new(5).unwrap();
//! let first = session.detect(max)?;
//! let second = session.detect(max)?; // first buffer still outstanding
//! first.release();
//! second.release();
//! # Ok(())
//! # }
//! ```
//!
//! ```compile_fail
//! # use face_session::Session;
//! # use std::num::NonZeroUsize;
//! # fn demo(session: &mut Session) -> Result<(), face_session::SessionError> {
//! let buffer = session.detect(NonZeroUsize::new(5).unwrap())?;
//! buffer.release();
//! buffer.release(); // released twice
//! # Ok(())
//! # }
//! ```
//!
//! ```compile_fail
//! # use face_session::Session;
//! # use std::num::NonZeroUsize;
//! # fn demo(session: &mut Session) -> Result<(), face_session::SessionError> {
//! let buffer = session.detect(NonZeroUsize::new(5).unwrap())?;
//! buffer.release();
//! let _bytes = buffer.pixels(); // read after release
//! # Ok(())
//! # }
//! ```

use serde::Serialize;

use crate::detect::{Detection, NormalizedPosition};
use crate::frame::{Frame, PixelFormat, Resolution};

/// One processed frame plus its detections, lent out by `Session::detect`.
///
/// Dropping the buffer releases it too; `release` just makes the handoff explicit.
pub struct ResultBuffer<'s> {
    frame: Frame,
    detections: Vec<Detection>,
    slot: &'s mut Vec<u8>,
}

impl<'s> ResultBuffer<'s> {
    pub(crate) fn new(frame: Frame, detections: Vec<Detection>, slot: &'s mut Vec<u8>) -> Self {
        Self {
            frame,
            detections,
            slot,
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn resolution(&self) -> Resolution {
        self.frame.resolution()
    }

    pub fn format(&self) -> PixelFormat {
        self.frame.format()
    }

    /// Capture sequence number within the session.
    pub fn sequence(&self) -> u64 {
        self.frame.sequence()
    }

    pub fn pixels(&self) -> &[u8] {
        self.frame.data()
    }

    pub fn byte_count(&self) -> usize {
        self.frame.byte_len()
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn normalized_positions(&self) -> Vec<NormalizedPosition> {
        let resolution = self.resolution();
        self.detections
            .iter()
            .map(|detection| detection.normalized(resolution))
            .collect()
    }

    /// Copy everything out so the buffer can be released right away.
    pub fn to_captured(&self) -> CapturedFrame {
        CapturedFrame {
            width: self.width(),
            height: self.height(),
            format: self.format(),
            sequence: self.sequence(),
            pixels: self.pixels().to_vec(),
            detections: self.detections.clone(),
        }
    }

    /// Hand the storage back to the session for the next capture.
    pub fn release(self) {}

    /// Detach the pixel storage from the session.
    ///
    /// Used by the native boundary, which must keep the bytes alive until the
    /// host calls `FreeMemory`; the storage goes back through
    /// `Session::reclaim_storage`.
    pub fn into_pixels(mut self) -> (Vec<u8>, Vec<Detection>) {
        let detections = std::mem::take(&mut self.detections);
        (self.frame.take_data(), detections)
    }
}

impl Drop for ResultBuffer<'_> {
    fn drop(&mut self) {
        let data = self.frame.take_data();
        if data.capacity() > 0 {
            *self.slot = data;
        }
    }
}

impl std::fmt::Debug for ResultBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence())
            .field("byte_count", &self.byte_count())
            .field("detections", &self.detections)
            .finish()
    }
}

/// Owned copy of a result buffer's contents.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sequence: u64,
    #[serde(skip)]
    pub pixels: Vec<u8>,
    pub detections: Vec<Detection>,
}

impl CapturedFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}
