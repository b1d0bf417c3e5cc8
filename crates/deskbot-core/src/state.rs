//! Robot behavior states and status snapshots.

use deskbot_body::Emotion;

/// Top-level behavior state.
///
/// Exactly one state is active at a time; every change goes through the
/// coordinator's request/commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    /// Nobody around: occasional fidgets, otherwise still.
    Idle,
    /// A face is in frame: keep it centered.
    Tracking,
    /// Reacting to a committed emotion with a gesture.
    Emotion(Emotion),
}

impl RobotState {
    pub fn name(self) -> &'static str {
        match self {
            RobotState::Idle => "idle",
            RobotState::Tracking => "tracking",
            RobotState::Emotion(_) => "emotion",
        }
    }
}

impl std::fmt::Display for RobotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RobotState::Emotion(e) => write!(f, "emotion({e})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Point-in-time snapshot published for status queries.
///
/// Stored behind an `ArcSwap` so readers on any thread get a consistent
/// view without blocking the decision loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: RobotState,
    /// Most recently committed emotion. Survives the return to
    /// tracking/idle; `None` only before the first reaction.
    pub current_emotion: Option<Emotion>,
    pub face_present: bool,
    pub sequence_running: bool,
    /// Tracked positions in stack order (base, torso, head).
    pub positions: [u16; 3],
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            state: RobotState::Idle,
            current_emotion: None,
            face_present: false,
            sequence_running: false,
            positions: [deskbot_bus::HOME_POSITION; 3],
        }
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "state={} emotion={} face={} busy={} positions={}/{}/{}",
            self.state,
            self.current_emotion.map(Emotion::as_str).unwrap_or("none"),
            self.face_present,
            self.sequence_running,
            self.positions[0],
            self.positions[1],
            self.positions[2],
        )
    }
}
