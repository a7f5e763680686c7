//! Frame acquisition.
//!
//! This module provides the camera side of a session:
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Synthetic `stub://` camera (tests, demos, machines without a camera)
//!
//! Every source normalises whatever the device delivers into packed RGB24 and
//! writes it into the caller's `Frame`, reusing its storage. Sources block for
//! the duration of one capture; there is no background capture thread.

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::CameraSettings;
use crate::frame::{Frame, Resolution};

pub use normalize::{normalize_into, SourceFormat};
pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
}

/// A camera (or camera stand-in) owned by exactly one session.
pub trait FrameSource {
    /// Open the device and return the negotiated capture resolution.
    fn connect(&mut self) -> Result<Resolution>;

    /// Capture one frame into `frame`.
    ///
    /// An error means the stream is gone (device unplugged, stream closed); the
    /// session drops the source and the caller has to re-initialise.
    fn capture(&mut self, frame: &mut Frame) -> Result<()>;

    fn stats(&self) -> SourceStats;
}

/// Open the camera named by `settings.device`.
///
/// `stub://` devices resolve to the synthetic camera; anything else is a V4L2
/// device node or index.
pub fn open_camera(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    if settings.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(settings)?));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Camera::new(settings.clone())))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        anyhow::bail!(
            "camera {} requires the ingest-v4l2 feature",
            settings.device
        )
    }
}
