//! Emotion vocabulary and scripted gesture sequences.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use crate::body::Body;
use crate::error::BodyError;
use crate::planner::Maneuver;
use crate::servo::{Joint, ServoMode};
use deskbot_bus::{ServoBus, POSITION_MAX, POSITION_MIN};

/// Speed for the small corrective moves issued while tracking a face.
pub const TRACK_SPEED: u16 = 100;

/// Encoder ticks per tracking correction.
pub const TRACK_NUDGE: i32 = 20;

/// The emotions the robot reacts to with a gesture.
///
/// The classifier also reports neutral and disgust; those carry no gesture
/// and are dropped at the perception boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Happy,
    Angry,
    Sad,
    Surprise,
    Fear,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Happy,
        Emotion::Angry,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Fear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Fear => "fear",
        }
    }

    /// Default acceptance threshold for classifier confidence.
    pub fn default_threshold(self) -> f64 {
        match self {
            Emotion::Happy => 0.95,
            Emotion::Angry => 0.6,
            Emotion::Sad => 0.5,
            Emotion::Surprise => 0.6,
            Emotion::Fear => 0.5,
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Emotion::Happy),
            "angry" => Ok(Emotion::Angry),
            "sad" => Ok(Emotion::Sad),
            "surprise" => Ok(Emotion::Surprise),
            "fear" => Ok(Emotion::Fear),
            _ => Err(UnknownEmotion),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownEmotion;

impl std::fmt::Display for UnknownEmotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not a gesture-bearing emotion label")
    }
}

impl std::error::Error for UnknownEmotion {}

/// One step of a scripted gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    MoveTo {
        joint: Joint,
        position: u16,
        speed: u16,
    },
    Geared(Maneuver),
    Pause(Duration),
    Home,
}

/// The scripted sequence for one emotion.
pub fn sequence(emotion: Emotion) -> Vec<Step> {
    match emotion {
        // Two torso sways and a little forward hop.
        Emotion::Happy => vec![
            Step::Geared(sway()),
            Step::Geared(sway()),
            Step::Geared(jump(0.0, -40.0, 40.0)),
            Step::Home,
        ],
        Emotion::Angry => vec![
            Step::Geared(shake_head()),
            Step::Geared(shake_head()),
            Step::Geared(shake_head()),
            Step::Home,
        ],
        // Slow droop, linger, recover.
        Emotion::Sad => vec![
            Step::MoveTo {
                joint: Joint::Torso,
                position: 400,
                speed: 80,
            },
            Step::MoveTo {
                joint: Joint::Head,
                position: 350,
                speed: 80,
            },
            Step::Pause(Duration::from_secs(2)),
            Step::Home,
        ],
        Emotion::Surprise => vec![
            Step::Geared(jump(0.0, 60.0, -60.0).hold(Duration::from_secs(2))),
            Step::Home,
        ],
        // A quick recoil, then head shakes.
        Emotion::Fear => vec![
            Step::Geared(jump(0.0, 60.0, -60.0)),
            Step::Geared(shake_head()),
            Step::Geared(shake_head()),
            Step::Home,
        ],
    }
}

fn sway() -> Maneuver {
    Maneuver::new(Duration::from_secs(1))
        .torso(70.0)
        .hold(Duration::from_millis(100))
        .and_back()
}

fn shake_head() -> Maneuver {
    Maneuver::new(Duration::from_millis(80))
        .head(45.0)
        .hold(Duration::from_millis(100))
        .and_back()
}

fn jump(base: f64, torso: f64, head: f64) -> Maneuver {
    Maneuver::new(Duration::from_millis(400))
        .base(base)
        .torso(torso)
        .head(head)
        .hold(Duration::from_millis(300))
        .and_back()
}

/// Run a gesture sequence to completion.
pub fn run<B: ServoBus>(body: &mut Body<B>, steps: &[Step]) -> Result<(), BodyError> {
    for step in steps {
        match step {
            Step::MoveTo {
                joint,
                position,
                speed,
            } => body.move_to(*joint, *position, *speed)?,
            Step::Geared(maneuver) => body.rotate_geared(maneuver)?,
            Step::Pause(duration) => spin_sleep::sleep(*duration),
            Step::Home => body.move_home(),
        }
    }
    Ok(())
}

/// Run the gesture for one emotion.
pub fn perform<B: ServoBus>(body: &mut Body<B>, emotion: Emotion) -> Result<(), BodyError> {
    info!("Performing gesture for {}", emotion);
    run(body, &sequence(emotion))
}

/// Tilt the whole stack upward to face a standing person.
///
/// One-way: the stack stays up until [`look_neutral`]. Both end with a
/// calibration pass since the geared legs do not return to start.
pub fn look_up<B: ServoBus>(body: &mut Body<B>) -> Result<(), BodyError> {
    body.rotate_geared(
        &Maneuver::new(Duration::from_secs(2))
            .base(180.0)
            .head(-180.0)
            .hold(Duration::ZERO),
    )?;
    body.calibrate();
    Ok(())
}

/// Undo [`look_up`].
pub fn look_neutral<B: ServoBus>(body: &mut Body<B>) -> Result<(), BodyError> {
    body.rotate_geared(
        &Maneuver::new(Duration::from_secs(2))
            .base(-180.0)
            .head(180.0)
            .hold(Duration::ZERO),
    )?;
    body.calibrate();
    Ok(())
}

/// Small idle motions so the robot does not look frozen.
///
/// Rolls the dice once; with probability `probability` runs a randomly
/// chosen glance or tilt. Returns whether a fidget ran.
pub fn idle_fidget<B: ServoBus, R: Rng>(
    body: &mut Body<B>,
    rng: &mut R,
    probability: f64,
) -> Result<bool, BodyError> {
    if rng.gen::<f64>() >= probability {
        return Ok(false);
    }
    let steps = match rng.gen_range(0..4u8) {
        0 => glance(200),
        1 => glance(800),
        2 => tilt(POSITION_MAX, POSITION_MIN),
        _ => tilt(POSITION_MIN, POSITION_MAX),
    };
    debug!("Idle fidget");
    run(body, &steps)?;
    Ok(true)
}

fn glance(position: u16) -> Vec<Step> {
    vec![
        Step::MoveTo {
            joint: Joint::Head,
            position,
            speed: 200,
        },
        Step::MoveTo {
            joint: Joint::Torso,
            position,
            speed: 200,
        },
        Step::Pause(Duration::from_secs(2)),
        Step::Home,
    ]
}

fn tilt(torso: u16, head: u16) -> Vec<Step> {
    vec![
        Step::MoveTo {
            joint: Joint::Torso,
            position: torso,
            speed: 200,
        },
        Step::MoveTo {
            joint: Joint::Head,
            position: head,
            speed: 200,
        },
        Step::Pause(Duration::from_secs(2)),
        Step::Home,
    ]
}

/// One tracking correction toward centering the face.
///
/// `displacement` is the face's horizontal offset from frame center,
/// positive to the right. The first joint with headroom takes the whole
/// correction, head outward to base. Returns whether any joint moved.
pub fn track_nudge<B: ServoBus>(
    body: &mut Body<B>,
    displacement: f64,
) -> Result<bool, BodyError> {
    let delta = if displacement <= 0.0 { TRACK_NUDGE } else { -TRACK_NUDGE };
    for joint in [Joint::Head, Joint::Torso, Joint::Base] {
        if body.mode(joint) != ServoMode::Positional {
            continue;
        }
        let target = i32::from(body.servo(joint).tracked) + delta;
        // Valid travel is 1..=1023: the encoder max is usable, zero is not.
        if target > i32::from(POSITION_MIN) && target <= i32::from(POSITION_MAX) {
            body.move_to(joint, target as u16, TRACK_SPEED)?;
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::ServoConfig;
    use deskbot_bus::{MockBus, HOME_POSITION};
    use rand::rngs::mock::StepRng;

    fn test_body() -> Body<MockBus> {
        let roster = [
            ServoConfig::new(1, 3.2),
            ServoConfig::new(3, 2.0),
            ServoConfig::new(0, 24.0 / 11.0),
        ];
        Body::new(MockBus::new(&[1, 3, 0]), roster).with_settle(Duration::ZERO)
    }

    #[test]
    fn emotion_labels_round_trip() {
        for emotion in Emotion::ALL {
            assert_eq!(emotion.as_str().parse::<Emotion>(), Ok(emotion));
        }
        assert!("neutral".parse::<Emotion>().is_err());
        assert!("disgust".parse::<Emotion>().is_err());
    }

    #[test]
    fn every_emotion_has_a_sequence_ending_home() {
        for emotion in Emotion::ALL {
            let steps = sequence(emotion);
            assert!(!steps.is_empty());
            assert_eq!(steps.last(), Some(&Step::Home));
        }
    }

    #[test]
    fn track_nudge_moves_head_first() {
        let mut body = test_body();
        // Face left of center: nudge positive.
        assert!(track_nudge(&mut body, -0.3).unwrap());
        assert_eq!(body.servo(Joint::Head).tracked, HOME_POSITION + 20);
        assert_eq!(body.servo(Joint::Torso).tracked, HOME_POSITION);
    }

    #[test]
    fn track_nudge_may_land_exactly_on_the_encoder_max() {
        let mut body = test_body();
        body.move_to(Joint::Head, POSITION_MAX - 20, 200).unwrap();
        assert!(track_nudge(&mut body, -0.3).unwrap());
        // 1003 + 20 = 1023 is still valid travel; the head takes it.
        assert_eq!(body.servo(Joint::Head).tracked, POSITION_MAX);
        assert_eq!(body.servo(Joint::Torso).tracked, HOME_POSITION);
    }

    #[test]
    fn track_nudge_falls_through_to_next_joint_at_travel_limit() {
        let mut body = test_body();
        body.move_to(Joint::Head, POSITION_MAX, 200).unwrap();
        assert!(track_nudge(&mut body, -0.3).unwrap());
        // Head had no headroom for a positive nudge; torso took it.
        assert_eq!(body.servo(Joint::Head).tracked, POSITION_MAX);
        assert_eq!(body.servo(Joint::Torso).tracked, HOME_POSITION + 20);
    }

    #[test]
    fn track_nudge_direction_follows_displacement_sign() {
        let mut body = test_body();
        assert!(track_nudge(&mut body, 0.4).unwrap());
        assert_eq!(body.servo(Joint::Head).tracked, HOME_POSITION - 20);
    }

    #[test]
    fn idle_fidget_respects_probability_zero() {
        let mut body = test_body();
        let mut rng = StepRng::new(0, 0);
        assert!(!idle_fidget(&mut body, &mut rng, 0.0).unwrap());
    }
}
