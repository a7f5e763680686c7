//! Face Session
//!
//! Frame acquisition and face detection behind a small session contract.
//!
//! # Architecture
//!
//! A caller polls once per update tick:
//!
//! 1. **Init**: load the face model (once), open the camera, learn its resolution.
//! 2. **Detect**: capture one frame, find faces, get back a `ResultBuffer`.
//! 3. **Release**: copy what is needed out of the buffer, then release it.
//! 4. **Close**: drop the camera.
//!
//! Detection coordinates are always in captured-frame pixels, whatever
//! downscale factor the detector runs at.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (V4L2 devices, synthetic `stub://` camera)
//! - `detect`: detection pipeline and backends (rustface, stub)
//! - `session`: the Init/Configure/Detect/Close state machine
//! - `buffer`: single-owner result handoff
//! - `wire` / `ffi`: `#[repr(C)]` structs and the native `Init`/`Detect`/... exports
//! - `display` / `poll`: caller-side sinks and the per-tick driver
//! - `config` / `error`: settings and the error taxonomy

pub mod buffer;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod ingest;
pub mod poll;
pub mod session;
pub mod wire;

pub use buffer::{CapturedFrame, ResultBuffer};
pub use config::{
    CameraSettings, DetectionSettings, ModelSettings, ReconnectSettings, SessionConfig, CONFIG_ENV,
};
pub use detect::{Detection, DetectorBackend, FaceBox, FaceDetector, NormalizedPosition};
pub use display::{LatestFrameSink, LogPositionSink, PositionSink, TextureFrame, TextureSink};
pub use error::{DeviceError, ProtocolViolation, SessionError};
pub use frame::{Frame, PixelFormat, Resolution};
pub use ingest::{open_camera, FrameSource, SourceStats, SyntheticCamera};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Camera;
pub use poll::{PollLoop, ReconnectPolicy, TickOutcome};
pub use session::{Session, SessionState, SessionStats, SourceFactory};
pub use wire::{CvCircle, CvFrame};
