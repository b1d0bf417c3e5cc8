//! The `Body` controller: mode gating, position tracking, geared maneuvers.

use std::time::Duration;

use deskbot_bus::{control_table, ServoBus, POSITION_MAX, POSITION_MIN, SPEED_MAX};
use tracing::{debug, info, warn};

use crate::error::BodyError;
use crate::planner::{self, Maneuver};
use crate::servo::{Joint, Servo, ServoConfig, ServoMode};

/// Speed used when returning joints to their home position.
pub const HOME_SPEED: u16 = 200;

/// High-level controller for the three-joint stack.
///
/// Owns the bus exclusively; all hardware writes in the process go through
/// one `Body` on one thread. Position reads while a servo is in
/// `Continuous` mode never touch hardware (feedback is garbage while
/// spinning); the tracked value is served instead. Entering `Positional`
/// mode performs a hardware read and overwrites the tracked value, which is
/// the only resynchronization point after wheel-mode work.
pub struct Body<B: ServoBus> {
    bus: B,
    servos: [Servo; 3],
    /// Settle time after commanding a home move, before reading positions
    /// back. Zero in tests.
    settle: Duration,
}

impl<B: ServoBus> Body<B> {
    pub fn new(bus: B, roster: [ServoConfig; 3]) -> Self {
        Self {
            bus,
            servos: roster.map(Servo::new),
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn servo(&self, joint: Joint) -> &Servo {
        &self.servos[joint.index()]
    }

    pub fn mode(&self, joint: Joint) -> ServoMode {
        self.servos[joint.index()].mode
    }

    /// Scan the bus, power the servos, and calibrate tracked positions.
    ///
    /// An empty scan result is fatal; a partially answering roster is
    /// logged and tolerated (the missing servo degrades at runtime like any
    /// other transport fault).
    pub fn start(&mut self) -> Result<(), BodyError> {
        let ids: Vec<u8> = self.servos.iter().map(Servo::id).collect();
        let found = deskbot_bus::scan(&mut self.bus, &ids);
        if found.is_empty() {
            return Err(BodyError::NoServosFound);
        }
        if found.len() < ids.len() {
            warn!("Only {}/{} servos answered the scan", found.len(), ids.len());
        }

        self.set_torque(true);
        self.set_mode_all(ServoMode::Positional);
        self.set_torque_limit(SPEED_MAX);
        self.calibrate();
        info!("Body started: {} servos online", found.len());
        Ok(())
    }

    /// Best-effort shutdown: home, settle, torque off.
    pub fn shutdown(&mut self) {
        info!("Shutting down body");
        self.move_home();
        spin_sleep::sleep(self.settle);
        self.set_torque(false);
    }

    // ==================== mode control ====================

    /// Switch one servo's operating mode by programming its angle-limit
    /// registers.
    ///
    /// On entry to `Positional` the servo is read immediately and the
    /// tracked value overwritten; nothing else restores trust in the
    /// tracked value after time spent in `Continuous`.
    pub fn set_mode(&mut self, joint: Joint, mode: ServoMode) {
        let id = self.servos[joint.index()].id();
        match mode {
            ServoMode::Positional => {
                self.write(id, control_table::CW_ANGLE_LIMIT, POSITION_MIN);
                self.write(id, control_table::CCW_ANGLE_LIMIT, POSITION_MAX);
                self.servos[joint.index()].mode = ServoMode::Positional;
                let pos = self.position(joint);
                debug!("Joint {:?} -> Positional, resynced at {}", joint, pos);
            }
            ServoMode::Continuous => {
                self.write(id, control_table::CW_ANGLE_LIMIT, 0);
                self.write(id, control_table::CCW_ANGLE_LIMIT, 0);
                self.servos[joint.index()].mode = ServoMode::Continuous;
                debug!("Joint {:?} -> Continuous", joint);
            }
        }
    }

    pub fn set_mode_all(&mut self, mode: ServoMode) {
        for joint in Joint::ALL {
            self.set_mode(joint, mode);
        }
    }

    // ==================== position and speed ====================

    /// Best available orientation for one joint.
    ///
    /// In `Positional` mode this is a hardware read that also refreshes the
    /// tracked value; a transport fault falls back to the last tracked
    /// value and never escapes. In `Continuous` mode the tracked value is
    /// returned without touching the bus.
    pub fn position(&mut self, joint: Joint) -> u16 {
        let servo = self.servos[joint.index()];
        match servo.mode {
            ServoMode::Continuous => servo.tracked,
            ServoMode::Positional => {
                match self.bus.read_register(servo.id(), control_table::PRESENT_POSITION) {
                    Ok(pos) => {
                        self.servos[joint.index()].tracked = pos;
                        pos
                    }
                    Err(e) => {
                        warn!(
                            "Position read failed for joint {:?}, using tracked {}: {}",
                            joint, servo.tracked, e
                        );
                        servo.tracked
                    }
                }
            }
        }
    }

    /// Command a positional move. Non-blocking: the goal is written and the
    /// tracked value optimistically set to the target.
    pub fn move_to(&mut self, joint: Joint, position: u16, speed: u16) -> Result<(), BodyError> {
        let servo = &self.servos[joint.index()];
        if servo.mode != ServoMode::Positional {
            return Err(BodyError::WrongMode {
                joint,
                expected: ServoMode::Positional,
            });
        }
        let id = servo.id();
        let position = position.min(POSITION_MAX);
        let speed = speed.min(SPEED_MAX);

        self.write(id, control_table::MOVING_SPEED, speed);
        self.write(id, control_table::GOAL_POSITION, position);
        self.servos[joint.index()].tracked = position;
        Ok(())
    }

    /// Command a wheel-mode rotation speed. Negative is counterclockwise.
    ///
    /// Deliberately does not touch the tracked value: this is velocity
    /// control, and the position estimate stays frozen at the last resync.
    pub fn spin(&mut self, joint: Joint, speed: i32) -> Result<(), BodyError> {
        let servo = &self.servos[joint.index()];
        if servo.mode != ServoMode::Continuous {
            return Err(BodyError::WrongMode {
                joint,
                expected: ServoMode::Continuous,
            });
        }
        let id = servo.id();
        let direction: u16 = if speed >= 0 { 0 } else { 1 };
        let magnitude = speed.unsigned_abs().min(u32::from(SPEED_MAX)) as u16;
        let value = magnitude | (direction << 10);
        self.write(id, control_table::MOVING_SPEED, value);
        Ok(())
    }

    /// Stop every joint currently in wheel mode.
    pub fn stop_wheels(&mut self) {
        for joint in Joint::ALL {
            if self.servos[joint.index()].mode == ServoMode::Continuous {
                let _ = self.spin(joint, 0);
            }
        }
    }

    /// Return every joint to its home position (forces positional mode).
    pub fn move_home(&mut self) {
        if self.servos.iter().any(|s| s.mode != ServoMode::Positional) {
            self.set_mode_all(ServoMode::Positional);
        }
        for joint in Joint::ALL {
            let home = self.servos[joint.index()].config.home;
            let _ = self.move_to(joint, home, HOME_SPEED);
        }
    }

    /// Full calibration pass: home, settle, read every position back.
    pub fn calibrate(&mut self) {
        debug!("Calibrating servo positions");
        if self.servos.iter().any(|s| s.mode != ServoMode::Positional) {
            self.set_mode_all(ServoMode::Positional);
        }
        self.move_home();
        spin_sleep::sleep(self.settle);
        for joint in Joint::ALL {
            let pos = self.position(joint);
            debug!("Joint {:?} calibrated at {}", joint, pos);
        }
    }

    // ==================== geared maneuvers ====================

    /// Execute a synchronized multi-joint wheel-mode maneuver.
    ///
    /// All participating joints start together, hold their independently
    /// computed rates for the maneuver duration (which is what makes them
    /// finish together), then stop. With `return_to_start` the speeds are
    /// reissued inverted for a second equal leg. Either way the stack is
    /// switched back to positional mode at the end, forcing a feedback
    /// resync.
    pub fn rotate_geared(&mut self, maneuver: &Maneuver) -> Result<(), BodyError> {
        let speeds = planner::wheel_speeds(maneuver, &self.servos);
        if speeds.is_empty() {
            return Ok(());
        }

        self.set_mode_all(ServoMode::Continuous);
        for s in &speeds {
            debug!("Joint {:?}: {:.1} deg/s -> speed {}", s.joint, s.rate_dps, s.signed_speed);
            self.spin(s.joint, s.signed_speed)?;
        }
        spin_sleep::sleep(maneuver.duration);
        self.stop_wheels();
        spin_sleep::sleep(maneuver.hold);

        if maneuver.return_to_start {
            for s in &speeds {
                self.spin(s.joint, -s.signed_speed)?;
            }
            spin_sleep::sleep(maneuver.duration);
            self.stop_wheels();
        }

        // Anything done in wheel mode leaves the tracked values stale;
        // dropping back to positional rereads the encoders.
        self.set_mode_all(ServoMode::Positional);
        Ok(())
    }

    // ==================== torque ====================

    pub fn set_torque(&mut self, enabled: bool) {
        let value = u16::from(enabled);
        for joint in Joint::ALL {
            let id = self.servos[joint.index()].id();
            self.write(id, control_table::TORQUE_ENABLE, value);
        }
    }

    pub fn set_torque_limit(&mut self, limit: u16) {
        let limit = limit.min(SPEED_MAX);
        for joint in Joint::ALL {
            let id = self.servos[joint.index()].id();
            self.write(id, control_table::TORQUE_LIMIT, limit);
        }
    }

    /// Single best-effort register write. Never retried: a lost write costs
    /// less than blowing the actuation loop's timing budget.
    fn write(&mut self, id: u8, addr: u8, value: u16) {
        if let Err(e) = self.bus.write_register(id, addr, value) {
            warn!("Write to servo {} addr {} failed: {}", id, addr, e);
        }
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
