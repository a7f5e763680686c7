//! Native entry points, driven the way an engine host calls them.
//!
//! Every test runs on its own thread and so gets its own native session.

use face_session::ffi::{self, configure_native, native_session_state};
use face_session::wire::{FRAME_LOST, FRAME_NOT_OPEN, FRAME_OK};
use face_session::{CvCircle, CvFrame, SessionConfig, SessionState};

fn stub_config(device: &str) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.camera.device = device.to_string();
    config.model.path = "stub://faces".to_string();
    config
}

fn init() -> (i32, i32, i32) {
    let (mut width, mut height) = (0, 0);
    let status = unsafe { ffi::Init(&mut width, &mut height) };
    (status, width, height)
}

fn detect(faces: &mut [CvCircle]) -> (CvFrame, i32) {
    let mut count = -1;
    let frame = unsafe { ffi::Detect(faces.as_mut_ptr(), faces.len() as i32, &mut count) };
    (frame, count)
}

#[test]
fn detect_before_init_reports_not_open() {
    let mut faces = [CvCircle::default(); 5];
    let (frame, count) = detect(&mut faces);
    assert_eq!(frame.error, FRAME_NOT_OPEN);
    assert!(frame.memPtr.is_null());
    assert_eq!((frame.x, frame.y, frame.bufferSize), (-1, -1, -1));
    assert_eq!(count, 0);
}

#[test]
fn init_detect_free_cycle() {
    configure_native(stub_config("stub://camera?faces=2"));
    let (status, width, height) = init();
    assert_eq!(status, 0);
    assert_eq!((width, height), (640, 480));
    assert_eq!(native_session_state(), Some(SessionState::Connected));

    let mut faces = [CvCircle::default(); 5];
    for _ in 0..3 {
        let (frame, count) = detect(&mut faces);
        assert_eq!(frame.error, FRAME_OK);
        assert_eq!((frame.x, frame.y), (width, height));
        assert_eq!(frame.bufferSize, frame.x * frame.y * 3);
        assert!(!frame.memPtr.is_null());
        assert_eq!(count, 2);
        for face in &faces[..count as usize] {
            assert!(face.X >= 0 && face.X < width);
            assert!(face.Y >= 0 && face.Y < height);
            assert!(face.Radius > 0);
        }

        let bytes = unsafe { std::slice::from_raw_parts(frame.memPtr, frame.bufferSize as usize) };
        assert_eq!(bytes.len(), (width * height * 3) as usize);
        ffi::FreeMemory();
    }

    ffi::Close();
    ffi::Close();
    assert_eq!(native_session_state(), Some(SessionState::Disconnected));
    let (frame, _) = detect(&mut faces);
    assert_eq!(frame.error, FRAME_NOT_OPEN);
}

#[test]
fn count_is_bounded_by_caller_capacity() {
    configure_native(stub_config("stub://camera?faces=4"));
    assert_eq!(init().0, 0);

    let mut faces = [CvCircle::default(); 2];
    let (frame, count) = detect(&mut faces);
    assert_eq!(frame.error, FRAME_OK);
    assert_eq!(count, 2);
    ffi::FreeMemory();

    let mut count = -1;
    let frame = unsafe { ffi::Detect(std::ptr::null_mut(), 0, &mut count) };
    assert_eq!(frame.error, FRAME_OK);
    assert_eq!(count, 0);
    ffi::FreeMemory();
}

#[test]
fn missing_model_returns_minus_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = stub_config("stub://camera");
    config.model.path = dir.path().join("missing.bin").display().to_string();
    configure_native(config);

    assert_eq!(init().0, -1);
    let mut faces = [CvCircle::default(); 1];
    assert_eq!(detect(&mut faces).0.error, FRAME_NOT_OPEN);
}

#[test]
fn unopenable_camera_returns_minus_two() {
    configure_native(stub_config("stub://camera?open=fail"));
    let (status, width, height) = init();
    assert_eq!(status, -2);
    assert_eq!((width, height), (0, 0));
}

#[test]
fn unplug_reports_frame_lost_then_reinit_recovers() {
    configure_native(stub_config("stub://camera?drop_after=1"));
    assert_eq!(init().0, 0);

    let mut faces = [CvCircle::default(); 5];
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    ffi::FreeMemory();

    let (frame, count) = detect(&mut faces);
    assert_eq!(frame.error, FRAME_LOST);
    assert!(frame.memPtr.is_null());
    assert_eq!(count, 0);
    assert_eq!(native_session_state(), Some(SessionState::Disconnected));

    assert_eq!(init().0, 0);
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    ffi::FreeMemory();
}

#[test]
fn set_scale_keeps_coordinates_in_capture_space() {
    configure_native(stub_config("stub://camera?faces=1"));
    let (_, width, height) = init();
    let mut faces = [CvCircle::default(); 1];

    let (_, count) = detect(&mut faces);
    assert_eq!(count, 1);
    let full = faces[0];
    ffi::FreeMemory();

    ffi::SetScale(0);
    ffi::SetScale(4);
    let (frame, count) = detect(&mut faces);
    assert_eq!((frame.x, frame.y), (width, height));
    assert_eq!(count, 1);
    assert!((full.X - faces[0].X).abs() <= 4);
    assert!((full.Y - faces[0].Y).abs() <= 4);
    ffi::FreeMemory();
}

#[test]
fn free_without_outstanding_frame_is_ignored() {
    configure_native(stub_config("stub://camera"));
    ffi::FreeMemory();
    assert_eq!(init().0, 0);
    ffi::FreeMemory();

    let mut faces = [CvCircle::default(); 5];
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    ffi::FreeMemory();
    ffi::FreeMemory();
    assert_eq!(native_session_state(), Some(SessionState::Connected));
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    ffi::FreeMemory();
}

#[test]
fn detect_with_frame_outstanding_reports_lost_then_recovers() {
    configure_native(stub_config("stub://camera?faces=1"));
    assert_eq!(init().0, 0);

    let mut faces = [CvCircle::default(); 5];
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    let (frame, count) = detect(&mut faces);
    assert_eq!(frame.error, FRAME_LOST);
    assert!(frame.memPtr.is_null());
    assert_eq!(count, 0);
    assert_eq!(native_session_state(), Some(SessionState::Disconnected));

    assert_eq!(init().0, 0);
    for _ in 0..2 {
        let (frame, count) = detect(&mut faces);
        assert_eq!(frame.error, FRAME_OK);
        assert_eq!(count, 1);
        ffi::FreeMemory();
    }
}

#[test]
fn close_releases_outstanding_frame() {
    configure_native(stub_config("stub://camera?faces=1"));
    assert_eq!(init().0, 0);

    let mut faces = [CvCircle::default(); 5];
    assert_eq!(detect(&mut faces).0.error, FRAME_OK);
    ffi::Close();
    assert_eq!(native_session_state(), Some(SessionState::Disconnected));

    for _ in 0..3 {
        assert_eq!(init().0, 0);
        let (frame, count) = detect(&mut faces);
        assert_eq!(frame.error, FRAME_OK);
        assert_eq!(count, 1);
        ffi::FreeMemory();
        ffi::Close();
    }
}
