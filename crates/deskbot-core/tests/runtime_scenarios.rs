//! End-to-end scenarios against a simulated bus and scripted perception.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use deskbot_body::{Body, Emotion, ServoConfig};
use deskbot_bus::{control_table, BusError, MockBus, ServoBus, HOME_POSITION};
use deskbot_core::runtime::PresentationSink;
use deskbot_core::{Command, Robot, RobotConfig, RobotState, ScriptedPerception, Transition};
use deskbot_core::perception::ScriptedFrame;

#[derive(Clone, Default)]
struct RecordingSink {
    transitions: Arc<Mutex<Vec<Transition>>>,
}

impl PresentationSink for RecordingSink {
    fn on_transition(&mut self, transition: Transition) {
        self.transitions.lock().unwrap().push(transition);
    }
}

/// Bus handle that stays inspectable after the runtime takes the body.
#[derive(Clone)]
struct SharedBus(Arc<Mutex<MockBus>>);

impl ServoBus for SharedBus {
    fn write_register(&mut self, id: u8, addr: u8, value: u16) -> Result<(), BusError> {
        self.0.lock().unwrap().write_register(id, addr, value)
    }

    fn read_register(&mut self, id: u8, addr: u8) -> Result<u16, BusError> {
        self.0.lock().unwrap().read_register(id, addr)
    }

    fn ping(&mut self, id: u8) -> Result<bool, BusError> {
        self.0.lock().unwrap().ping(id)
    }
}

fn roster() -> [ServoConfig; 3] {
    [
        ServoConfig::new(1, 3.2),
        ServoConfig::new(3, 2.0),
        ServoConfig::new(0, 24.0 / 11.0),
    ]
}

fn sim_body() -> Body<MockBus> {
    Body::new(MockBus::new(&[1, 3, 0]), roster()).with_settle(Duration::ZERO)
}

fn fast_config() -> RobotConfig {
    let mut config = RobotConfig::default();
    config.tick_secs = 0.02;
    config.cooldown_secs = 0.02;
    config.hold_secs = 0.3;
    config.tracking_grace_secs = 0.5;
    // Keep the body still unless a gesture is asked for.
    config.fidget_probability = 0.0;
    config
}

fn wait_for(robot: &Robot, deadline: Duration, predicate: impl Fn(RobotState) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate(robot.status().state) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn face_walkthrough_reaches_emotion_and_recovers() {
    // A face appears, looks sad for a while, then leaves.
    let mut script = Vec::new();
    for _ in 0..10 {
        script.push(ScriptedFrame::face_at(0.0));
    }
    for _ in 0..4 {
        script.push(ScriptedFrame::face_at(0.0).with_emotion(Emotion::Sad, 0.9));
    }
    for _ in 0..10 {
        script.push(ScriptedFrame::face_at(0.0));
    }

    let sink = RecordingSink::default();
    let transitions = Arc::clone(&sink.transitions);
    let robot = Robot::start(
        sim_body(),
        ScriptedPerception::new(script),
        sink,
        &fast_config(),
    )
    .unwrap();

    assert!(wait_for(&robot, Duration::from_secs(3), |s| {
        s == RobotState::Tracking
    }));
    assert!(wait_for(&robot, Duration::from_secs(5), |s| {
        matches!(s, RobotState::Emotion(Emotion::Sad))
    }));
    // Gesture done, hold elapsed, script exhausted: back down to idle.
    assert!(wait_for(&robot, Duration::from_secs(10), |s| {
        s == RobotState::Idle
    }));
    // The snapshot keeps the last reaction even after the state moves on.
    assert_eq!(robot.status().current_emotion, Some(Emotion::Sad));

    robot.shutdown();

    let transitions = transitions.lock().unwrap();
    assert!(transitions
        .iter()
        .any(|t| t.from == RobotState::Idle && t.to == RobotState::Tracking));
    assert!(transitions
        .iter()
        .any(|t| t.to == RobotState::Emotion(Emotion::Sad)));
}

#[test]
fn operator_emotion_command_forces_a_reaction() {
    let sink = RecordingSink::default();
    let transitions = Arc::clone(&sink.transitions);
    let robot = Robot::start(
        sim_body(),
        ScriptedPerception::new([]),
        sink,
        &fast_config(),
    )
    .unwrap();

    robot.handle(Command::parse("angry").unwrap());
    assert!(wait_for(&robot, Duration::from_secs(3), |s| {
        matches!(s, RobotState::Emotion(Emotion::Angry))
    }));

    robot.shutdown();
    assert!(transitions
        .lock()
        .unwrap()
        .iter()
        .any(|t| t.to == RobotState::Emotion(Emotion::Angry)));
}

#[test]
fn status_reports_home_positions_after_start() {
    let robot = Robot::start(
        sim_body(),
        ScriptedPerception::new([]),
        RecordingSink::default(),
        &fast_config(),
    )
    .unwrap();

    // Give the body loop a beat to publish its first snapshot.
    std::thread::sleep(Duration::from_millis(300));
    let status = robot.status();
    assert_eq!(status.state, RobotState::Idle);
    assert_eq!(status.current_emotion, None);
    assert_eq!(status.positions, [HOME_POSITION; 3]);

    robot.shutdown();
}

#[test]
fn shutdown_parks_the_servos() {
    let bus = Arc::new(Mutex::new(MockBus::new(&[1, 3, 0])));
    let body = Body::new(SharedBus(Arc::clone(&bus)), roster()).with_settle(Duration::ZERO);
    let robot = Robot::start(
        body,
        ScriptedPerception::new([]),
        RecordingSink::default(),
        &fast_config(),
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(200));
    robot.shutdown();

    let bus = bus.lock().unwrap();
    for id in [1, 3, 0] {
        assert_eq!(bus.register(id, control_table::TORQUE_ENABLE), Some(0));
        assert_eq!(bus.register(id, control_table::GOAL_POSITION), Some(HOME_POSITION));
    }
}
