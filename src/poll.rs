//! Per-tick driver for a session.
//!
//! `PollLoop::tick` is meant to be called once per display update. It keeps
//! the session connected, presents one processed frame per tick and backs off
//! while the camera is unavailable.
//!
//! Retry rules:
//! - a failed `detect` is followed by one immediate `init` on the next tick
//! - each failed `init` doubles the wait, from `initial_backoff` up to `max_backoff`
//! - a `detect` failing before any frame was presented since `init` counts as a failed `init`
//! - the backoff resets once a frame is presented
//! - a model load failure halts the loop until `reset`
//!
//! While the loop is not presenting, sinks receive nothing, so the last good
//! frame stays on screen.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::config::ReconnectSettings;
use crate::display::{PositionSink, TextureFrame, TextureSink};
use crate::error::SessionError;
use crate::frame::Resolution;
use crate::session::Session;

#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    next_delay: Duration,
    retry_at: Option<Instant>,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            next_delay: initial,
            retry_at: None,
        }
    }

    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self::new(settings.initial_backoff, settings.max_backoff)
    }

    /// True when an `init` attempt is allowed at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    /// Record a failed `init`; returns the wait before the next attempt.
    pub fn init_failed(&mut self, now: Instant) -> Duration {
        let delay = self.next_delay;
        self.retry_at = Some(now + delay);
        self.next_delay = delay.saturating_mul(2).min(self.max);
        delay
    }

    /// Record a lost connection; the next attempt may run immediately.
    pub fn connection_lost(&mut self) {
        self.reset();
    }

    pub fn connected(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.next_delay = self.initial;
        self.retry_at = None;
    }
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame reached the sinks.
    Presented { faces: usize, resized: bool },
    /// The camera is unavailable; the next `init` runs after `retry_in`.
    Reconnecting { retry_in: Duration },
    /// Still inside the backoff window; nothing was attempted.
    Waiting,
    /// The face model could not be loaded; nothing runs until `reset`.
    Halted,
}

pub struct PollLoop {
    session: Session,
    max_detections: NonZeroUsize,
    policy: ReconnectPolicy,
    halted: bool,
    presented_since_connect: bool,
    frame_size: Option<Resolution>,
}

impl PollLoop {
    /// Loop using the session's configured detection limit and backoff.
    pub fn new(session: Session) -> Self {
        let max_detections = session.config().detection.max_detections;
        let policy = ReconnectPolicy::from_settings(&session.config().reconnect);
        Self {
            session,
            max_detections,
            policy,
            halted: false,
            presented_since_connect: false,
            frame_size: None,
        }
    }

    pub fn with_max_detections(mut self, max_detections: NonZeroUsize) -> Self {
        self.max_detections = max_detections;
        self
    }

    pub fn tick(
        &mut self,
        textures: &mut dyn TextureSink,
        positions: &mut dyn PositionSink,
    ) -> TickOutcome {
        self.tick_at(Instant::now(), textures, positions)
    }

    pub fn tick_at(
        &mut self,
        now: Instant,
        textures: &mut dyn TextureSink,
        positions: &mut dyn PositionSink,
    ) -> TickOutcome {
        if self.halted {
            return TickOutcome::Halted;
        }

        if !self.session.is_connected() {
            if !self.policy.ready(now) {
                return TickOutcome::Waiting;
            }
            match self.session.init() {
                Ok(_) => self.presented_since_connect = false,
                Err(err) if err.is_model_load() => {
                    log::error!("PollLoop: {}; halting until reset", err);
                    self.halted = true;
                    return TickOutcome::Halted;
                }
                Err(_) => {
                    let retry_in = self.policy.init_failed(now);
                    log::debug!("PollLoop: next reconnect attempt in {:?}", retry_in);
                    return TickOutcome::Reconnecting { retry_in };
                }
            }
        }

        let presented = present(
            &mut self.session,
            self.max_detections,
            &mut self.frame_size,
            textures,
            positions,
        );
        match presented {
            Ok((faces, resized)) => {
                self.presented_since_connect = true;
                self.policy.connected();
                TickOutcome::Presented { faces, resized }
            }
            Err(err) => {
                log::warn!("PollLoop: {}; reconnecting", err);
                self.session.close();
                // A camera that opens but never delivers counts as a failed init.
                let retry_in = if self.presented_since_connect {
                    self.policy.connection_lost();
                    Duration::ZERO
                } else {
                    self.policy.init_failed(now)
                };
                self.presented_since_connect = false;
                TickOutcome::Reconnecting { retry_in }
            }
        }
    }

    /// Clear a model halt and any pending backoff.
    pub fn reset(&mut self) {
        self.halted = false;
        self.policy.reset();
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}

/// Detect one frame and hand it to the sinks; returns (faces, resized).
fn present(
    session: &mut Session,
    max_detections: NonZeroUsize,
    frame_size: &mut Option<Resolution>,
    textures: &mut dyn TextureSink,
    positions: &mut dyn PositionSink,
) -> Result<(usize, bool), SessionError> {
    let buffer = session.detect(max_detections)?;

    let resolution = buffer.resolution();
    let resized = *frame_size != Some(resolution);
    if resized {
        textures.resize(resolution.width, resolution.height);
        *frame_size = Some(resolution);
    }
    textures.upload(TextureFrame {
        width: buffer.width(),
        height: buffer.height(),
        format: buffer.format(),
        pixels: buffer.pixels(),
    });
    let faces = buffer.detections().len();
    positions.publish(&buffer.normalized_positions());
    buffer.release();

    Ok((faces, resized))
}
