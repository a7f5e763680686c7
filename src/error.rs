//! Session error taxonomy.
//!
//! The session boundary surfaces three classes of failure:
//!
//! - `ModelLoad`: classifier data missing or unreadable. Fatal until the model or
//!   configuration is fixed; callers must not auto-retry.
//! - `Device`: the camera could not be opened or was lost mid-stream. Transient;
//!   the caller retries `init` on a later tick.
//! - `Protocol`: the caller broke the session contract (detect while disconnected,
//!   buffer bookkeeping at the native boundary).
//!
//! The numeric codes are the ones the native `Init` entry point reports.

use thiserror::Error;

/// `Init` status: success.
pub const STATUS_OK: i32 = 0;
/// `Init` status: classifier data could not be loaded.
pub const STATUS_MODEL_LOAD: i32 = -1;
/// `Init` status: camera could not be opened (or any other reconnect-needed failure).
pub const STATUS_DEVICE: i32 = -2;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load face model {path}: {source}")]
    ModelLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("camera device error: {0}")]
    Device(#[from] DeviceError),
    #[error("session protocol violation: {0}")]
    Protocol(ProtocolViolation),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open camera {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("camera stream is not open")]
    NotConnected,
    #[error("camera frame lost: {0}")]
    FrameLost(#[source] anyhow::Error),
    #[error("frame processing failed: {0}")]
    Processing(#[source] anyhow::Error),
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("detect called while the session is not connected")]
    NotConnected,
    #[error("detect called while a result buffer is still outstanding")]
    BufferOutstanding,
    #[error("release called with no outstanding result buffer")]
    NoBufferOutstanding,
}

impl SessionError {
    /// Numeric status for the native boundary.
    ///
    /// Protocol violations collapse into the device class so that a release
    /// build keeps the caller on its reconnect path instead of looping errors.
    pub fn code(&self) -> i32 {
        match self {
            SessionError::ModelLoad { .. } => STATUS_MODEL_LOAD,
            SessionError::Device(_) | SessionError::Protocol(_) => STATUS_DEVICE,
        }
    }

    /// True when the caller has to run `init` again before detecting.
    pub fn needs_reconnect(&self) -> bool {
        !matches!(self, SessionError::ModelLoad { .. })
    }

    pub fn is_model_load(&self) -> bool {
        matches!(self, SessionError::ModelLoad { .. })
    }
}

impl From<ProtocolViolation> for SessionError {
    fn from(violation: ProtocolViolation) -> Self {
        SessionError::Protocol(violation)
    }
}
