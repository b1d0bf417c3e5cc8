//! Geared maneuver planning.
//!
//! A maneuver is expressed in body-frame degrees per joint. Each joint sits
//! behind its own gear train, so the same body rotation needs a different
//! servo speed per joint; the planner scales every joint's rate so that all
//! participants finish in the shared duration.

use std::time::Duration;

use crate::servo::{Joint, Servo};

/// Wheel-mode rotation rate at full speed command, in servo-shaft degrees
/// per second.
pub const DEG_PER_SEC_AT_MAX_SPEED: f64 = 360.0;

/// A synchronized multi-joint rotation request.
///
/// Degrees are body-frame: positive is counterclockwise looking down the
/// joint axis. Joints left at zero do not participate and are not touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Maneuver {
    degrees: [f64; 3],
    pub duration: Duration,
    pub hold: Duration,
    pub return_to_start: bool,
    pub max_speed: u16,
}

impl Maneuver {
    pub fn new(duration: Duration) -> Self {
        Self {
            degrees: [0.0; 3],
            duration,
            hold: Duration::from_secs(1),
            return_to_start: false,
            max_speed: deskbot_bus::SPEED_MAX,
        }
    }

    pub fn base(mut self, degrees: f64) -> Self {
        self.degrees[Joint::Base.index()] = degrees;
        self
    }

    pub fn torso(mut self, degrees: f64) -> Self {
        self.degrees[Joint::Torso.index()] = degrees;
        self
    }

    pub fn head(mut self, degrees: f64) -> Self {
        self.degrees[Joint::Head.index()] = degrees;
        self
    }

    /// Pause between the outbound leg and the return leg (or after the
    /// outbound leg for one-way maneuvers).
    pub fn hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Drive the same speeds inverted for a second leg, ending where the
    /// maneuver started.
    pub fn and_back(mut self) -> Self {
        self.return_to_start = true;
        self
    }

    /// Cap the speed command written to any joint.
    pub fn max_speed(mut self, max_speed: u16) -> Self {
        self.max_speed = max_speed.min(deskbot_bus::SPEED_MAX);
        self
    }

    pub fn degrees(&self, joint: Joint) -> f64 {
        self.degrees[joint.index()]
    }
}

/// Planned speed for one participating joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSpeed {
    pub joint: Joint,
    /// Servo-shaft rate in degrees per second (always positive).
    pub rate_dps: f64,
    /// Speed command with sign carrying the direction.
    pub signed_speed: i32,
}

/// Convert a maneuver into per-joint wheel speed commands.
///
/// For each participating joint the body-frame rotation is multiplied by
/// that joint's gear ratio to get servo-shaft degrees, divided by the
/// shared duration to get a rate, and linearly mapped onto the speed scale.
/// Rates beyond what the servo can do saturate at `max_speed`, which makes
/// the joint undershoot rather than desynchronize the others.
pub fn wheel_speeds(maneuver: &Maneuver, servos: &[Servo; 3]) -> Vec<JointSpeed> {
    let secs = maneuver.duration.as_secs_f64();
    if secs <= 0.0 {
        return Vec::new();
    }
    let mut speeds = Vec::new();
    for joint in Joint::ALL {
        let degrees = maneuver.degrees(joint);
        if degrees == 0.0 {
            continue;
        }
        let servo_rotation = degrees * servos[joint.index()].config.gear_ratio;
        let rate_dps = servo_rotation.abs() / secs;
        let magnitude = ((rate_dps / DEG_PER_SEC_AT_MAX_SPEED) * f64::from(maneuver.max_speed))
            as i32;
        let magnitude = magnitude.min(i32::from(maneuver.max_speed));
        let signed_speed = if servo_rotation >= 0.0 { magnitude } else { -magnitude };
        speeds.push(JointSpeed {
            joint,
            rate_dps,
            signed_speed,
        });
    }
    speeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::ServoConfig;
    use proptest::prelude::*;

    fn test_servos() -> [Servo; 3] {
        [
            Servo::new(ServoConfig::new(1, 3.2)),
            Servo::new(ServoConfig::new(3, 2.0)),
            Servo::new(ServoConfig::new(0, 24.0 / 11.0)),
        ]
    }

    #[test]
    fn opposed_joints_finish_together_at_different_rates() {
        // Base +180 deg through 3.2:1 and torso -180 deg through 2.0:1
        // over two seconds.
        let m = Maneuver::new(Duration::from_secs(2)).base(180.0).torso(-180.0);
        let speeds = wheel_speeds(&m, &test_servos());
        assert_eq!(speeds.len(), 2);

        let base = speeds.iter().find(|s| s.joint == Joint::Base).unwrap();
        let torso = speeds.iter().find(|s| s.joint == Joint::Torso).unwrap();
        assert!((base.rate_dps - 288.0).abs() < 1e-9);
        assert!((torso.rate_dps - 180.0).abs() < 1e-9);
        assert!(base.signed_speed > 0);
        assert!(torso.signed_speed < 0);

        // 288/360 and 180/360 of the full speed scale.
        assert_eq!(base.signed_speed, 818);
        assert_eq!(torso.signed_speed, -511);
    }

    #[test]
    fn zero_rotation_joints_are_excluded() {
        let m = Maneuver::new(Duration::from_secs(1)).head(90.0);
        let speeds = wheel_speeds(&m, &test_servos());
        assert_eq!(speeds.len(), 1);
        assert_eq!(speeds[0].joint, Joint::Head);
    }

    #[test]
    fn infeasible_rates_saturate_at_max_speed() {
        // 360 body degrees through 3.2:1 in a tenth of a second.
        let m = Maneuver::new(Duration::from_millis(100)).base(360.0);
        let speeds = wheel_speeds(&m, &test_servos());
        assert_eq!(speeds[0].signed_speed, i32::from(deskbot_bus::SPEED_MAX));
    }

    #[test]
    fn max_speed_cap_scales_the_command() {
        let m = Maneuver::new(Duration::from_secs(2)).base(180.0).max_speed(512);
        let speeds = wheel_speeds(&m, &test_servos());
        // Same 288 deg/s rate mapped onto the halved scale.
        assert_eq!(speeds[0].signed_speed, 409);
    }

    #[test]
    fn zero_duration_plans_nothing() {
        let m = Maneuver::new(Duration::ZERO).base(90.0);
        assert!(wheel_speeds(&m, &test_servos()).is_empty());
    }

    proptest! {
        #[test]
        fn inverted_maneuver_negates_every_speed(
            base in -360.0f64..360.0,
            torso in -360.0f64..360.0,
            head in -360.0f64..360.0,
            millis in 100u64..5000,
        ) {
            let duration = Duration::from_millis(millis);
            let forward = Maneuver::new(duration).base(base).torso(torso).head(head);
            let back = Maneuver::new(duration).base(-base).torso(-torso).head(-head);

            let fw = wheel_speeds(&forward, &test_servos());
            let bk = wheel_speeds(&back, &test_servos());
            prop_assert_eq!(fw.len(), bk.len());
            for (f, b) in fw.iter().zip(&bk) {
                prop_assert_eq!(f.joint, b.joint);
                prop_assert_eq!(f.signed_speed, -b.signed_speed);
                prop_assert!((f.rate_dps - b.rate_dps).abs() < 1e-9);
            }
        }
    }
}
