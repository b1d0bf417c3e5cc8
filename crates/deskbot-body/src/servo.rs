//! Per-servo bookkeeping: identity, gearing, mode, tracked position.

use deskbot_bus::HOME_POSITION;
use serde::Deserialize;

/// The three stacked joints, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    /// Turntable at the bottom of the stack.
    Base,
    /// Middle cylinder ("body" in the mechanical drawings).
    Torso,
    /// Top cylinder carrying the eye display.
    Head,
}

impl Joint {
    pub const ALL: [Joint; 3] = [Joint::Base, Joint::Torso, Joint::Head];

    pub fn index(self) -> usize {
        match self {
            Joint::Base => 0,
            Joint::Torso => 1,
            Joint::Head => 2,
        }
    }
}

/// Servo operating mode.
///
/// The hardware encodes the mode in the angle-limit registers: a non-zero
/// CCW limit gives bounded travel with valid position feedback
/// (`Positional`); both limits zero give unbounded wheel rotation where the
/// position register is garbage (`Continuous`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoMode {
    Positional,
    Continuous,
}

/// Static per-servo configuration from the roster.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ServoConfig {
    /// Bus ID.
    pub id: u8,
    /// Servo-shaft degrees per output-joint degree (cylinder teeth over
    /// servo teeth).
    pub gear_ratio: f64,
    /// Home reference in encoder units.
    #[serde(default = "default_home")]
    pub home: u16,
}

fn default_home() -> u16 {
    HOME_POSITION
}

impl ServoConfig {
    pub fn new(id: u8, gear_ratio: f64) -> Self {
        Self {
            id,
            gear_ratio,
            home: HOME_POSITION,
        }
    }
}

/// Runtime state for one servo.
///
/// `tracked` is the best available orientation estimate. It is trustworthy
/// immediately after entering `Positional` mode or after an explicit read
/// while positional; while `Continuous` it is a dead-reckoned leftover from
/// the last resync.
#[derive(Debug, Clone, Copy)]
pub struct Servo {
    pub config: ServoConfig,
    pub mode: ServoMode,
    pub tracked: u16,
}

impl Servo {
    pub fn new(config: ServoConfig) -> Self {
        Self {
            config,
            mode: ServoMode::Positional,
            tracked: config.home,
        }
    }

    pub fn id(&self) -> u8 {
        self.config.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joints_index_in_stack_order() {
        assert_eq!(Joint::Base.index(), 0);
        assert_eq!(Joint::Torso.index(), 1);
        assert_eq!(Joint::Head.index(), 2);
        assert_eq!(Joint::ALL.len(), 3);
    }

    #[test]
    fn new_servo_starts_positional_at_home() {
        let servo = Servo::new(ServoConfig::new(1, 3.2));
        assert_eq!(servo.mode, ServoMode::Positional);
        assert_eq!(servo.tracked, HOME_POSITION);
    }
}
