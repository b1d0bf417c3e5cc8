//! # Deskbot Coordination Layer
//!
//! Ties perception to actuation through a small explicit state machine.
//! [`Coordinator`] owns the state transitions (all mode changes are
//! requested, then committed on the decision tick), [`EmotionDebouncer`]
//! turns noisy per-frame classifier output into committed emotion events,
//! and [`Robot`] wires the loops together across threads.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod perception;
pub mod runtime;
pub mod slot;
pub mod state;

pub use command::Command;
pub use config::RobotConfig;
pub use coordinator::{Coordinator, Transition};
pub use debounce::{EmotionDebouncer, EmotionEvent};
pub use perception::{FaceBox, Perception, ScriptedPerception};
pub use runtime::{PresentationSink, Robot};
pub use slot::SharedSlot;
pub use state::{RobotState, StatusReport};
