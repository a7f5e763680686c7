use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use face_session::{
    open_camera, CameraSettings, LatestFrameSink, NormalizedPosition, PollLoop, PositionSink,
    Session, SessionConfig, TickOutcome,
};

#[derive(Default)]
struct RecordingPositions {
    batches: Vec<Vec<NormalizedPosition>>,
}

impl PositionSink for RecordingPositions {
    fn publish(&mut self, positions: &[NormalizedPosition]) {
        self.batches.push(positions.to_vec());
    }
}

fn config(device: &str, model: &str) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.camera.device = device.to_string();
    config.model.path = model.to_string();
    config.reconnect.initial_backoff = Duration::from_millis(10);
    config.reconnect.max_backoff = Duration::from_millis(40);
    config
}

fn counting_loop(config: SessionConfig) -> (PollLoop, Rc<Cell<u32>>) {
    let opened = Rc::new(Cell::new(0));
    let counter = Rc::clone(&opened);
    let session = Session::with_source_factory(
        config,
        Box::new(move |settings: &CameraSettings| {
            counter.set(counter.get() + 1);
            open_camera(settings)
        }),
    );
    (PollLoop::new(session), opened)
}

#[test]
fn presents_frames_and_positions() {
    let mut poll = PollLoop::new(Session::new(config("stub://camera?faces=2", "stub://faces")));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let now = Instant::now();

    assert_eq!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Presented {
            faces: 2,
            resized: true
        }
    );
    assert_eq!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Presented {
            faces: 2,
            resized: false
        }
    );
    assert_eq!(textures.resizes(), 1);
    assert_eq!(textures.uploads(), 2);
    assert_eq!(textures.latest().unwrap().dimensions(), (640, 480));

    let batch = &positions.batches[0];
    assert_eq!(batch.len(), 2);
    for position in batch {
        assert!((0.0..=1.0).contains(&position.x));
        assert!((0.0..=1.0).contains(&position.y));
    }
    assert!(batch[0].x < batch[1].x);
}

#[test]
fn lost_camera_is_retried_on_next_tick() {
    let (mut poll, opened) = counting_loop(config("stub://camera?drop_after=1", "stub://faces"));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let now = Instant::now();

    assert!(matches!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Presented { .. }
    ));
    assert_eq!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Reconnecting {
            retry_in: Duration::ZERO
        }
    );
    assert!(matches!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Presented { .. }
    ));
    assert_eq!(opened.get(), 2);
    // The last good frame stayed in the sink while reconnecting.
    assert_eq!(textures.uploads(), 2);
}

#[test]
fn failed_init_backs_off_exponentially() {
    let (mut poll, opened) = counting_loop(config("stub://camera?open=fail", "stub://faces"));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let start = Instant::now();
    let ms = Duration::from_millis;

    let mut at = start;
    let mut delays = Vec::new();
    for _ in 0..4 {
        match poll.tick_at(at, &mut textures, &mut positions) {
            TickOutcome::Reconnecting { retry_in } => {
                assert_eq!(
                    poll.tick_at(at + retry_in / 2, &mut textures, &mut positions),
                    TickOutcome::Waiting
                );
                delays.push(retry_in);
                at += retry_in;
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(delays, vec![ms(10), ms(20), ms(40), ms(40)]);
    assert_eq!(opened.get(), 4);
    assert_eq!(textures.uploads(), 0);
}

#[test]
fn camera_that_opens_but_never_delivers_backs_off() {
    let (mut poll, opened) = counting_loop(config("stub://camera?drop_after=0", "stub://faces"));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let ms = Duration::from_millis;

    let mut at = Instant::now();
    let mut delays = Vec::new();
    for _ in 0..4 {
        match poll.tick_at(at, &mut textures, &mut positions) {
            TickOutcome::Reconnecting { retry_in } => {
                assert_eq!(
                    poll.tick_at(at, &mut textures, &mut positions),
                    TickOutcome::Waiting
                );
                delays.push(retry_in);
                at += retry_in;
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(delays, vec![ms(10), ms(20), ms(40), ms(40)]);
    assert_eq!(opened.get(), 4);
    assert_eq!(textures.uploads(), 0);
}

#[test]
fn presented_frame_resets_backoff() {
    let (mut poll, opened) = counting_loop(config("stub://camera?drop_after=1", "stub://faces"));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let now = Instant::now();

    for _ in 0..3 {
        assert!(matches!(
            poll.tick_at(now, &mut textures, &mut positions),
            TickOutcome::Presented { .. }
        ));
        assert_eq!(
            poll.tick_at(now, &mut textures, &mut positions),
            TickOutcome::Reconnecting {
                retry_in: Duration::ZERO
            }
        );
    }
    assert_eq!(opened.get(), 3);
    assert_eq!(textures.uploads(), 3);
}

#[test]
fn model_failure_halts_until_reset() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.bin").display().to_string();
    let (mut poll, opened) = counting_loop(config("stub://camera", &missing));
    let mut textures = LatestFrameSink::new();
    let mut positions = RecordingPositions::default();
    let now = Instant::now();

    for _ in 0..3 {
        assert_eq!(
            poll.tick_at(now, &mut textures, &mut positions),
            TickOutcome::Halted
        );
    }
    assert!(poll.is_halted());
    assert_eq!(opened.get(), 0);

    poll.reset();
    assert!(!poll.is_halted());
    assert_eq!(
        poll.tick_at(now, &mut textures, &mut positions),
        TickOutcome::Halted
    );
    assert_eq!(opened.get(), 0);
}
