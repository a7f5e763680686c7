//! `#[repr(C)]` structs exchanged with native callers.
//!
//! Field order and widths are fixed: hosts marshal these sequentially
//! (`CvCircle` is 12 bytes, `CvFrame` 24 bytes on 64-bit targets).

#![allow(non_snake_case)]

use std::ptr;

use crate::detect::Detection;
use crate::error::{DeviceError, ProtocolViolation, SessionError};

/// `CvFrame.error`: frame is valid.
pub const FRAME_OK: i32 = 0;
/// `CvFrame.error`: capture is not open (includes Detect before Init).
pub const FRAME_NOT_OPEN: i32 = -1;
/// `CvFrame.error`: frame lost, device most likely unplugged.
pub const FRAME_LOST: i32 = -2;
/// `CvFrame.error`: frame captured but processing failed.
pub const FRAME_PROCESSING_FAILED: i32 = -3;

/// One detected face as a circle in captured-frame pixels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CvCircle {
    pub X: i32,
    pub Y: i32,
    pub Radius: i32,
}

impl From<&Detection> for CvCircle {
    fn from(detection: &Detection) -> Self {
        Self {
            X: saturating_i32(detection.x as usize),
            Y: saturating_i32(detection.y as usize),
            Radius: saturating_i32(detection.radius as usize),
        }
    }
}

/// Frame descriptor returned by `Detect`.
///
/// `memPtr` points at `bufferSize` bytes of packed RGB24 owned by the library
/// until the host calls `FreeMemory`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CvFrame {
    pub memPtr: *const u8,
    pub x: i32,
    pub y: i32,
    pub bufferSize: i32,
    pub error: i32,
}

impl CvFrame {
    pub fn new(pixels: &[u8], width: u32, height: u32) -> Self {
        Self {
            memPtr: pixels.as_ptr(),
            x: saturating_i32(width as usize),
            y: saturating_i32(height as usize),
            bufferSize: saturating_i32(pixels.len()),
            error: FRAME_OK,
        }
    }

    pub fn error(code: i32) -> Self {
        Self {
            memPtr: ptr::null(),
            x: -1,
            y: -1,
            bufferSize: -1,
            error: code,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error != FRAME_OK
    }
}

/// Detect-time error code for a session failure.
pub fn frame_error_code(err: &SessionError) -> i32 {
    match err {
        SessionError::Protocol(ProtocolViolation::NotConnected)
        | SessionError::Device(DeviceError::NotConnected)
        | SessionError::ModelLoad { .. } => FRAME_NOT_OPEN,
        SessionError::Device(DeviceError::Open { .. })
        | SessionError::Device(DeviceError::FrameLost(_)) => FRAME_LOST,
        SessionError::Device(DeviceError::Processing(_)) => FRAME_PROCESSING_FAILED,
        SessionError::Protocol(_) => FRAME_LOST,
    }
}

fn saturating_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<CvCircle>() == 12);
    assert!(std::mem::size_of::<CvFrame>() == 24);
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FaceBox;
    use anyhow::anyhow;

    #[test]
    fn error_frame_layout() {
        let frame = CvFrame::error(FRAME_LOST);
        assert!(frame.memPtr.is_null());
        assert_eq!((frame.x, frame.y, frame.bufferSize), (-1, -1, -1));
        assert!(frame.is_error());
    }

    #[test]
    fn ok_frame_reports_buffer_size() {
        let pixels = vec![0u8; 4 * 3 * 3];
        let frame = CvFrame::new(&pixels, 4, 3);
        assert_eq!(frame.bufferSize, frame.x * frame.y * 3);
        assert_eq!(frame.memPtr, pixels.as_ptr());
        assert!(!frame.is_error());
    }

    #[test]
    fn circle_from_detection() {
        let detection = Detection {
            x: 120,
            y: 80,
            radius: 16,
            bounds: FaceBox {
                x: 104,
                y: 64,
                width: 32,
                height: 32,
            },
        };
        assert_eq!(
            CvCircle::from(&detection),
            CvCircle {
                X: 120,
                Y: 80,
                Radius: 16
            }
        );
    }

    #[test]
    fn session_errors_map_to_frame_codes() {
        let lost = SessionError::from(DeviceError::FrameLost(anyhow!("unplugged")));
        assert_eq!(frame_error_code(&lost), FRAME_LOST);
        let processing = SessionError::from(DeviceError::Processing(anyhow!("bad frame")));
        assert_eq!(frame_error_code(&processing), FRAME_PROCESSING_FAILED);
        let closed = SessionError::from(ProtocolViolation::NotConnected);
        assert_eq!(frame_error_code(&closed), FRAME_NOT_OPEN);
    }
}
