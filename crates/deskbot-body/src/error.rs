//! Actuation layer error types.

use deskbot_bus::BusError;
use thiserror::Error;

use crate::servo::{Joint, ServoMode};

/// Actuation layer error type.
#[derive(Error, Debug)]
pub enum BodyError {
    /// Bus transport error that could not be recovered locally.
    #[error("Servo bus error: {0}")]
    Bus(#[from] BusError),

    /// Startup scan found no servos at all. Fatal: the process must not
    /// start its loops against an empty roster.
    #[error("No servos detected on the bus")]
    NoServosFound,

    /// A command was issued against the wrong operating mode.
    #[error("Joint {joint:?} is not in {expected:?} mode")]
    WrongMode { joint: Joint, expected: ServoMode },
}
