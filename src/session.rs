//! Session state machine.
//!
//! A `Session` coordinates one frame source and one face detector:
//!
//! ```text
//! Disconnected --init--> Connecting --ok--> Connected
//!       ^                    |                  |
//!       +------failed--------+                  |
//!       +------close / device error on detect---+
//! ```
//!
//! The detector model is loaded on the first `init` and kept across
//! reconnects. The frame source is dropped whenever the session leaves
//! `Connected`, and rebuilt by the next `init`. The session never retries on
//! its own; reconnecting is the caller's decision (see `poll::PollLoop`).

use std::num::{NonZeroU32, NonZeroUsize};

use serde::Serialize;

use crate::buffer::ResultBuffer;
use crate::config::{CameraSettings, SessionConfig};
use crate::detect::{annotate, Detection, FaceDetector};
use crate::error::{DeviceError, ProtocolViolation, SessionError};
use crate::frame::{Frame, Resolution};
use crate::ingest::{open_camera, FrameSource, SourceStats};

/// Builds the frame source for a camera. Called once per `init`.
pub type SourceFactory = Box<dyn FnMut(&CameraSettings) -> anyhow::Result<Box<dyn FrameSource>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub faces_reported: u64,
    pub connects: u64,
    pub device_errors: u64,
    pub source: Option<SourceStats>,
}

pub struct Session {
    config: SessionConfig,
    factory: SourceFactory,
    detector: Option<FaceDetector>,
    source: Option<Box<dyn FrameSource>>,
    state: SessionState,
    resolution: Option<Resolution>,
    downscale: NonZeroU32,
    storage: Vec<u8>,
    sequence: u64,
    stats: SessionStats,
}

impl Session {
    /// Session opening cameras through `ingest::open_camera`.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_source_factory(config, Box::new(open_camera))
    }

    pub fn with_source_factory(config: SessionConfig, factory: SourceFactory) -> Self {
        let downscale = config.detection.downscale;
        Self {
            config,
            factory,
            detector: None,
            source: None,
            state: SessionState::Disconnected,
            resolution: None,
            downscale,
            storage: Vec::new(),
            sequence: 0,
            stats: SessionStats::default(),
        }
    }

    /// Load the model (first call only) and open the camera.
    ///
    /// A model failure is reported before the camera is touched. Calling
    /// `init` while connected re-opens the camera.
    pub fn init(&mut self) -> Result<Resolution, SessionError> {
        if self.state == SessionState::Connected {
            log::info!("Session: re-opening {}", self.config.camera.device);
            self.source = None;
        }
        self.state = SessionState::Connecting;

        if let Err(err) = self.ensure_detector() {
            self.state = SessionState::Disconnected;
            log::warn!("Session: {}", err);
            return Err(err);
        }

        match self.open_source() {
            Ok((source, resolution)) => {
                self.source = Some(source);
                self.resolution = Some(resolution);
                self.state = SessionState::Connected;
                self.stats.connects += 1;
                log::info!(
                    "Session: connected to {} at {} (downscale {})",
                    self.config.camera.device,
                    resolution,
                    self.downscale
                );
                Ok(resolution)
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                self.stats.device_errors += 1;
                log::warn!("Session: {}", err);
                Err(err)
            }
        }
    }

    /// Set the detection downscale factor. Takes effect on the next `detect`.
    pub fn configure(&mut self, downscale: NonZeroU32) {
        if downscale != self.downscale {
            log::info!("Session: downscale {} -> {}", self.downscale, downscale);
        }
        self.downscale = downscale;
    }

    /// Capture one frame and detect at most `max_detections` faces in it.
    ///
    /// The returned buffer borrows the session until it is released. Any
    /// device-class error drops the camera and leaves the session
    /// `Disconnected`.
    pub fn detect(&mut self, max_detections: NonZeroUsize) -> Result<ResultBuffer<'_>, SessionError> {
        if self.state != SessionState::Connected {
            return Err(ProtocolViolation::NotConnected.into());
        }

        let mut frame = Frame::with_storage(std::mem::take(&mut self.storage));
        let outcome = match (self.source.as_mut(), self.detector.as_mut()) {
            (Some(source), Some(detector)) => process_frame(
                source.as_mut(),
                detector,
                &mut frame,
                max_detections,
                self.downscale,
                self.config.detection.annotate,
            ),
            _ => Err(DeviceError::NotConnected),
        };

        let detections = match outcome {
            Ok(detections) => detections,
            Err(err) => {
                self.storage = frame.take_data();
                self.drop_source(&err);
                return Err(err.into());
            }
        };

        let resolution = frame.resolution();
        if self.resolution != Some(resolution) {
            log::warn!(
                "Session: camera switched resolution to {} mid-stream",
                resolution
            );
            self.resolution = Some(resolution);
        }
        self.sequence += 1;
        frame.set_sequence(self.sequence);
        self.stats.frames_processed += 1;
        self.stats.faces_reported += detections.len() as u64;
        log::debug!(
            "Session: frame {} ({}) with {} face(s)",
            self.sequence,
            resolution,
            detections.len()
        );

        Ok(ResultBuffer::new(frame, detections, &mut self.storage))
    }

    /// Release the camera. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::info!("Session: closed {}", self.config.camera.device);
        }
        self.state = SessionState::Disconnected;
    }

    /// Take back pixel storage detached with `ResultBuffer::into_pixels`.
    pub fn reclaim_storage(&mut self, storage: Vec<u8>) {
        if storage.capacity() > self.storage.capacity() {
            self.storage = storage;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Capture resolution negotiated by the last successful `init`.
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn downscale(&self) -> NonZeroU32 {
        self.downscale
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Name of the loaded detector backend, once a model has been loaded.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.detector.as_ref().map(FaceDetector::backend_name)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            source: self.source.as_ref().map(|source| source.stats()),
            ..self.stats.clone()
        }
    }

    fn ensure_detector(&mut self) -> Result<(), SessionError> {
        if self.detector.is_some() {
            return Ok(());
        }
        let model = &self.config.model;
        let detector = FaceDetector::load(model, self.config.detection.equalize).map_err(
            |source| SessionError::ModelLoad {
                path: model.path.clone(),
                source,
            },
        )?;
        log::info!("Session: using {} face detector", detector.backend_name());
        self.detector = Some(detector);
        Ok(())
    }

    fn open_source(&mut self) -> Result<(Box<dyn FrameSource>, Resolution), SessionError> {
        let camera = &self.config.camera;
        let open_error = |source: anyhow::Error| DeviceError::Open {
            device: camera.device.clone(),
            source,
        };
        let mut source = (self.factory)(camera).map_err(open_error)?;
        let resolution = source.connect().map_err(open_error)?;
        if resolution.width == 0 || resolution.height == 0 {
            return Err(open_error(anyhow::anyhow!(
                "camera reported an empty resolution {}",
                resolution
            ))
            .into());
        }
        Ok((source, resolution))
    }

    fn drop_source(&mut self, err: &DeviceError) {
        self.stats.device_errors += 1;
        self.source = None;
        self.state = SessionState::Disconnected;
        log::warn!(
            "Session: {} on {}; re-initialise to continue",
            err,
            self.config.camera.device
        );
    }
}

fn process_frame(
    source: &mut dyn FrameSource,
    detector: &mut FaceDetector,
    frame: &mut Frame,
    max_detections: NonZeroUsize,
    downscale: NonZeroU32,
    draw: bool,
) -> Result<Vec<Detection>, DeviceError> {
    source.capture(frame).map_err(DeviceError::FrameLost)?;
    let detections = detector
        .detect(frame, max_detections, downscale)
        .map_err(DeviceError::Processing)?;
    if draw {
        annotate(frame, &detections).map_err(DeviceError::Processing)?;
    }
    Ok(detections)
}
