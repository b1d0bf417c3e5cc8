//! The behavior state machine.
//!
//! All state changes follow a request/commit cycle: anything may request a
//! target state at any time (latest request wins), but only the decision
//! tick commits, and commits are rate-limited by a cooldown and blocked
//! while a gesture sequence is running. This keeps the body from being
//! yanked between behaviors by a noisy classifier.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::state::RobotState;

/// A committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RobotState,
    pub to: RobotState,
}

pub struct Coordinator {
    state: RobotState,
    requested: Option<RobotState>,
    last_commit: Option<Instant>,
    /// When a face was last observed, fed in on every tick.
    face_last_seen: Option<Instant>,
    /// When the current `Emotion` state was entered.
    emotion_entered: Option<Instant>,
    /// Minimum spacing between commits.
    cooldown: Duration,
    /// Minimum dwell time in `Emotion` before an automatic exit.
    hold: Duration,
    /// How long a face may be absent before `Tracking` gives up.
    grace: Duration,
}

impl Coordinator {
    pub fn new(cooldown: Duration, hold: Duration, grace: Duration) -> Self {
        Self {
            state: RobotState::Idle,
            requested: None,
            last_commit: None,
            face_last_seen: None,
            emotion_entered: None,
            cooldown,
            hold,
            grace,
        }
    }

    pub fn state(&self) -> RobotState {
        self.state
    }

    /// Request a state change. Overwrites any pending request; the change
    /// happens on a later tick, if at all.
    pub fn request(&mut self, target: RobotState) {
        debug!("State requested: {} (current {})", target, self.state);
        self.requested = Some(target);
    }

    /// One decision tick. Returns the transition if one committed.
    pub fn tick(
        &mut self,
        now: Instant,
        face_present: bool,
        sequence_running: bool,
    ) -> Option<Transition> {
        if face_present {
            self.face_last_seen = Some(now);
        }

        // Explicit requests take priority over the automatic transitions.
        let target = match self.requested {
            Some(t) => Some(t),
            None => self.auto_target(now, face_present),
        };
        let target = target?;

        if target == self.state {
            self.requested = None;
            return None;
        }
        if !self.can_commit(now, sequence_running) {
            // Leave an explicit request pending for a later tick.
            return None;
        }
        // An emotion reaction runs to its hold time even if something asks
        // to leave early.
        if self.emotion_dwell_remaining(now) && !matches!(target, RobotState::Emotion(_)) {
            return None;
        }

        self.requested = None;
        let from = self.state;
        self.state = target;
        self.last_commit = Some(now);
        self.emotion_entered = matches!(target, RobotState::Emotion(_)).then_some(now);
        info!("State committed: {} -> {}", from, target);
        Some(Transition { from, to: target })
    }

    fn can_commit(&self, now: Instant, sequence_running: bool) -> bool {
        if sequence_running {
            return false;
        }
        self.last_commit
            .is_none_or(|t| now.duration_since(t) >= self.cooldown)
    }

    fn emotion_dwell_remaining(&self, now: Instant) -> bool {
        matches!(self.state, RobotState::Emotion(_))
            && self
                .emotion_entered
                .is_some_and(|t| now.duration_since(t) < self.hold)
    }

    fn auto_target(&self, now: Instant, face_present: bool) -> Option<RobotState> {
        match self.state {
            RobotState::Idle if face_present => Some(RobotState::Tracking),
            RobotState::Tracking if !face_present => {
                let gone_long_enough = self
                    .face_last_seen
                    .is_none_or(|t| now.duration_since(t) >= self.grace);
                gone_long_enough.then_some(RobotState::Idle)
            }
            RobotState::Emotion(_) if !self.emotion_dwell_remaining(now) => {
                Some(if face_present {
                    RobotState::Tracking
                } else {
                    RobotState::Idle
                })
            }
            _ => None,
        }
    }
}
