//! Native entry points (`cdylib`).
//!
//! Hosts call these from one thread, once per update tick:
//!
//! 1. `Init(&w, &h)` until it returns 0 (-1 model error, -2 device error)
//! 2. `Detect(faces, max, &count)` then `FreeMemory()` once the frame bytes are copied
//! 3. `Close()` when done
//!
//! Calling `Detect` with a frame outstanding closes the camera and reports
//! `FRAME_LOST`; a `FreeMemory` with nothing outstanding is ignored. Both are
//! logged at error level and never panic, since a panic cannot unwind out of
//! an `extern "C"` function and would abort the host.
//!
//! Each calling thread gets its own session. The session is built lazily on
//! the first `Init`, from `configure_native` if the host process set a config
//! from Rust, otherwise from `SessionConfig::load()`.

#![allow(non_snake_case)]

use std::cell::RefCell;
use std::num::{NonZeroU32, NonZeroUsize};

use crate::config::SessionConfig;
use crate::error::{ProtocolViolation, STATUS_MODEL_LOAD, STATUS_OK};
use crate::session::{Session, SessionState};
use crate::wire::{frame_error_code, CvCircle, CvFrame, FRAME_LOST, FRAME_NOT_OPEN};

#[derive(Default)]
struct NativeState {
    config: Option<SessionConfig>,
    session: Option<Session>,
    scale: Option<NonZeroU32>,
    /// Pixels handed out by the last `Detect`, alive until `FreeMemory`.
    pending: Option<Vec<u8>>,
}

thread_local! {
    static NATIVE: RefCell<NativeState> = RefCell::new(NativeState::default());
}

/// Use `config` for this thread's native session instead of `SessionConfig::load()`.
///
/// Replaces (and closes) any session the thread already has.
pub fn configure_native(config: SessionConfig) {
    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        if let Some(mut session) = state.session.take() {
            session.close();
        }
        state.pending = None;
        state.config = Some(config);
    });
}

/// State of this thread's native session, if one has been created.
pub fn native_session_state() -> Option<SessionState> {
    NATIVE.with(|cell| cell.borrow().session.as_ref().map(Session::state))
}

/// Open the camera and report its resolution.
///
/// Returns 0 on success, -1 if the face model could not be loaded and -2 if
/// the camera could not be opened.
///
/// # Safety
/// `outWidth` and `outHeight` must each be null or valid for a write of one `i32`.
#[no_mangle]
pub unsafe extern "C" fn Init(outWidth: *mut i32, outHeight: *mut i32) -> i32 {
    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        let state = &mut *state;
        if state.session.is_none() {
            let config = match state.config.take() {
                Some(config) => config,
                None => match SessionConfig::load() {
                    Ok(config) => config,
                    Err(err) => {
                        log::error!("Init: invalid configuration: {:#}", err);
                        return STATUS_MODEL_LOAD;
                    }
                },
            };
            let mut session = Session::new(config);
            if let Some(scale) = state.scale {
                session.configure(scale);
            }
            state.session = Some(session);
        }
        let Some(session) = state.session.as_mut() else {
            return STATUS_MODEL_LOAD;
        };

        match session.init() {
            Ok(resolution) => {
                // SAFETY: the caller guarantees the pointers are null or writable.
                unsafe {
                    write_out(outWidth, to_i32(resolution.width as usize));
                    write_out(outHeight, to_i32(resolution.height as usize));
                }
                STATUS_OK
            }
            Err(err) => err.code(),
        }
    })
}

/// Release the camera and any frame still outstanding. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn Close() {
    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        let state = &mut *state;
        let pending = state.pending.take();
        if let Some(session) = state.session.as_mut() {
            if let Some(storage) = pending {
                session.reclaim_storage(storage);
            }
            session.close();
        }
    });
}

/// Set the detection downscale factor; values below 1 are ignored.
#[no_mangle]
pub extern "C" fn SetScale(factor: i32) {
    let Some(scale) = u32::try_from(factor).ok().and_then(NonZeroU32::new) else {
        log::warn!("SetScale: ignoring invalid factor {}", factor);
        return;
    };
    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        state.scale = Some(scale);
        if let Some(session) = state.session.as_mut() {
            session.configure(scale);
        }
    });
}

/// Hand the frame returned by the last successful `Detect` back to the library.
#[no_mangle]
pub extern "C" fn FreeMemory() {
    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        let state = &mut *state;
        match state.pending.take() {
            Some(storage) => {
                if let Some(session) = state.session.as_mut() {
                    session.reclaim_storage(storage);
                }
            }
            None => log::error!("FreeMemory: {}; ignored", ProtocolViolation::NoBufferOutstanding),
        }
    });
}

/// Capture one frame and detect faces in it.
///
/// Writes at most `maxCount` circles to `outFaces` and their number to
/// `outCount`. A frame with a negative `error` means the camera is gone and
/// `Init` has to be called again.
///
/// # Safety
/// `outFaces` must be null or valid for writes of `maxCount` `CvCircle`s, and
/// `outCount` must be null or valid for a write of one `i32`.
#[no_mangle]
pub unsafe extern "C" fn Detect(outFaces: *mut CvCircle, maxCount: i32, outCount: *mut i32) -> CvFrame {
    // SAFETY: the caller guarantees `outCount` is null or writable.
    unsafe { write_out(outCount, 0) };

    NATIVE.with(|cell| {
        let mut state = cell.borrow_mut();
        let state = &mut *state;
        let Some(session) = state.session.as_mut() else {
            return CvFrame::error(FRAME_NOT_OPEN);
        };

        if let Some(storage) = state.pending.take() {
            log::error!("Detect: {}; closing the camera", ProtocolViolation::BufferOutstanding);
            session.reclaim_storage(storage);
            session.close();
            return CvFrame::error(FRAME_LOST);
        }

        let capacity = if outFaces.is_null() {
            0
        } else {
            usize::try_from(maxCount).unwrap_or(0)
        };
        let max = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        let buffer = match session.detect(max) {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!("Detect: {}", err);
                return CvFrame::error(frame_error_code(&err));
            }
        };

        let (width, height) = (buffer.width(), buffer.height());
        let (pixels, detections) = buffer.into_pixels();
        let written = detections.len().min(capacity);
        if written > 0 {
            // SAFETY: `outFaces` is non-null and valid for `capacity >= written` circles.
            let out = unsafe { std::slice::from_raw_parts_mut(outFaces, written) };
            for (slot, detection) in out.iter_mut().zip(&detections) {
                *slot = CvCircle::from(detection);
            }
        }
        // SAFETY: the caller guarantees `outCount` is null or writable.
        unsafe { write_out(outCount, to_i32(written)) };

        let frame = CvFrame::new(&pixels, width, height);
        state.pending = Some(pixels);
        frame
    })
}

unsafe fn write_out(ptr: *mut i32, value: i32) {
    if !ptr.is_null() {
        // SAFETY: forwarded from the entry point contracts.
        unsafe { ptr.write(value) };
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
