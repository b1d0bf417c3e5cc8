//! Operator console commands.

use deskbot_body::Emotion;

use crate::state::RobotState;

/// A parsed operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Force an emotion reaction.
    Emotion(Emotion),
    /// Print the current status snapshot.
    Status,
    /// Return all joints to home.
    Home,
    /// Tilt the stack up to face a standing person.
    LookUp,
    /// Undo a look-up.
    LookNeutral,
    /// Shut the robot down.
    Quit,
}

impl Command {
    /// Parse one console line. Unknown input is `None` and should be
    /// ignored by the caller.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim().to_ascii_lowercase();
        match line.as_str() {
            "status" => Some(Command::Status),
            "home" => Some(Command::Home),
            "look up" => Some(Command::LookUp),
            "look down" | "look neutral" => Some(Command::LookNeutral),
            "quit" | "exit" => Some(Command::Quit),
            other => other.parse::<Emotion>().ok().map(Command::Emotion),
        }
    }

    /// The state this command requests, if it is a state-changing one.
    pub fn requested_state(self) -> Option<RobotState> {
        match self {
            Command::Emotion(e) => Some(RobotState::Emotion(e)),
            _ => None,
        }
    }
}
