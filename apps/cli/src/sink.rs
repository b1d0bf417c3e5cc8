//! Console presentation: the robot's "face" as log lines.

use deskbot_body::Emotion;
use deskbot_core::runtime::PresentationSink;
use deskbot_core::{RobotState, Transition};
use tracing::info;

/// Prints an expression marker on every state change. A display-equipped
/// build would swap this for an eye renderer.
#[derive(Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    fn expression(state: RobotState) -> &'static str {
        match state {
            RobotState::Idle => "( - _ - )",
            RobotState::Tracking => "( o _ o )",
            RobotState::Emotion(Emotion::Happy) => "( ^ _ ^ )",
            RobotState::Emotion(Emotion::Angry) => "( > _ < )",
            RobotState::Emotion(Emotion::Sad) => "( ; _ ; )",
            RobotState::Emotion(Emotion::Surprise) => "( O _ O )",
            RobotState::Emotion(Emotion::Fear) => "( 0 _ 0 )",
        }
    }
}

impl PresentationSink for ConsoleSink {
    fn on_transition(&mut self, transition: Transition) {
        info!(
            "{} -> {}  {}",
            transition.from,
            transition.to,
            Self::expression(transition.to)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_an_expression() {
        assert_ne!(
            ConsoleSink::expression(RobotState::Idle),
            ConsoleSink::expression(RobotState::Tracking)
        );
        for emotion in Emotion::ALL {
            assert!(!ConsoleSink::expression(RobotState::Emotion(emotion)).is_empty());
        }
    }
}
