//! # Deskbot Actuation Layer
//!
//! Controls the three stacked rotary joints of the robot (base, torso,
//! head). The central concern is position bookkeeping: the servos expose
//! two mutually exclusive operating modes, and only one of them reports
//! trustworthy absolute feedback. [`Body`] owns that bookkeeping,
//! [`planner`] converts body-frame rotations into synchronized wheel-mode
//! maneuvers, and [`gesture`] maps emotions to scripted sequences.

mod body;
mod error;
pub mod gesture;
pub mod planner;
mod servo;

pub use body::{Body, HOME_SPEED};
pub use error::BodyError;
pub use gesture::{Emotion, Step};
pub use planner::{JointSpeed, Maneuver, DEG_PER_SEC_AT_MAX_SPEED};
pub use servo::{Joint, Servo, ServoConfig, ServoMode};
