//! Threaded runtime wiring perception, decision, actuation and
//! presentation together.
//!
//! Four loops on four threads:
//! - vision: polls [`Perception`], feeds face presence and debounced
//!   emotions into the coordinator
//! - decision: ticks the coordinator at a fixed period and publishes
//!   committed transitions
//! - body: sole owner of the [`Body`]; runs gestures, tracking nudges and
//!   idle fidgets
//! - presentation: forwards transitions to a [`PresentationSink`]
//!
//! Lifecycle is coupled through one `is_running` flag: any loop that hits
//! a fatal error clears it and everything winds down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use deskbot_body::{gesture, Body, BodyError, Emotion, Joint};
use deskbot_bus::{BusError, ServoBus};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::RobotConfig;
use crate::coordinator::{Coordinator, Transition};
use crate::debounce::EmotionDebouncer;
use crate::perception::Perception;
use crate::slot::SharedSlot;
use crate::state::{RobotState, StatusReport};

/// Poll period of the vision and body loops.
const LOOP_PERIOD: Duration = Duration::from_millis(50);
/// How long shutdown waits for each thread before giving up on it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
/// The body thread parks the servos (home, settle, torque off) on its
/// exit path, and may be mid-gesture when the stop flag lands. It gets a
/// timeout long enough to cover the longest gesture plus the park.
const BODY_JOIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Extension trait for timeout-capable thread joins.
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The watchdog keeps waiting; the OS cleans up on exit.
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// Receives committed state transitions, e.g. to drive a face display.
pub trait PresentationSink: Send {
    fn on_transition(&mut self, transition: Transition);
}

/// One-shot jobs routed to the body thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyJob {
    Home,
    LookUp,
    LookNeutral,
}

/// State shared by all loops.
struct Shared {
    coordinator: Mutex<Coordinator>,
    status: ArcSwap<StatusReport>,
    is_running: AtomicBool,
    /// Gesture in progress; gates state commits.
    sequence_running: AtomicBool,
    face_present: AtomicBool,
    /// Bumped on every Emotion commit so the body loop performs each
    /// reaction exactly once.
    emotion_seq: AtomicU64,
    /// Most recently committed emotion, kept for status snapshots after
    /// the robot has moved back to tracking or idle.
    last_emotion: Mutex<Option<Emotion>>,
    /// Latest face displacement, overwritten each vision frame.
    displacement: SharedSlot<f64>,
}

/// The assembled robot: four loops plus the command surface.
pub struct Robot {
    shared: Arc<Shared>,
    jobs: SharedSlot<BodyJob>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl Robot {
    /// Start the body and spawn all loops.
    pub fn start<B, P, S>(
        mut body: Body<B>,
        perception: P,
        sink: S,
        config: &RobotConfig,
    ) -> Result<Self, BodyError>
    where
        B: ServoBus + Send + 'static,
        P: Perception + 'static,
        S: PresentationSink + 'static,
    {
        body.start()?;

        let shared = Arc::new(Shared {
            coordinator: Mutex::new(Coordinator::new(
                config.cooldown(),
                config.hold(),
                config.tracking_grace(),
            )),
            status: ArcSwap::from_pointee(StatusReport::default()),
            is_running: AtomicBool::new(true),
            sequence_running: AtomicBool::new(false),
            face_present: AtomicBool::new(false),
            emotion_seq: AtomicU64::new(0),
            last_emotion: Mutex::new(None),
            displacement: SharedSlot::new(),
        });
        let jobs = SharedSlot::new();
        let (transition_tx, transition_rx) = crossbeam_channel::bounded::<Transition>(8);

        let mut threads = Vec::new();

        {
            let shared = Arc::clone(&shared);
            let debouncer = config.debouncer();
            let center_tolerance = config.center_tolerance;
            threads.push((
                "vision",
                thread::Builder::new()
                    .name("deskbot-vision".into())
                    .spawn(move || vision_loop(perception, debouncer, shared, center_tolerance))
                    .map_err(BusError::Io)?,
            ));
        }
        {
            let shared = Arc::clone(&shared);
            let tick = config.tick();
            threads.push((
                "decision",
                thread::Builder::new()
                    .name("deskbot-decision".into())
                    .spawn(move || decision_loop(shared, transition_tx, tick))
                    .map_err(BusError::Io)?,
            ));
        }
        {
            let shared = Arc::clone(&shared);
            let jobs = jobs.clone();
            let fidget_interval = config.fidget_interval();
            let fidget_probability = config.fidget_probability;
            let center_tolerance = config.center_tolerance;
            threads.push((
                "body",
                thread::Builder::new()
                    .name("deskbot-body".into())
                    .spawn(move || {
                        body_loop(
                            body,
                            shared,
                            jobs,
                            fidget_interval,
                            fidget_probability,
                            center_tolerance,
                        )
                    })
                    .map_err(BusError::Io)?,
            ));
        }
        {
            let shared = Arc::clone(&shared);
            threads.push((
                "presentation",
                thread::Builder::new()
                    .name("deskbot-presentation".into())
                    .spawn(move || presentation_loop(sink, transition_rx, shared))
                    .map_err(BusError::Io)?,
            ));
        }

        info!("Robot runtime started ({} threads)", threads.len());
        Ok(Self {
            shared,
            jobs,
            threads,
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Acquire)
    }

    /// Current status snapshot. Never blocks the loops.
    pub fn status(&self) -> StatusReport {
        self.shared.status.load().as_ref().clone()
    }

    /// Route one operator command. `Status` and `Quit` are handled by the
    /// caller via [`Robot::status`] and [`Robot::shutdown`].
    pub fn handle(&self, command: Command) {
        match command {
            Command::Emotion(_) => {
                if let Some(target) = command.requested_state() {
                    self.shared.coordinator.lock().request(target);
                }
            }
            Command::Home => {
                self.jobs.put(BodyJob::Home);
            }
            Command::LookUp => {
                self.jobs.put(BodyJob::LookUp);
            }
            Command::LookNeutral => {
                self.jobs.put(BodyJob::LookNeutral);
            }
            Command::Status | Command::Quit => {}
        }
    }

    /// Stop all loops and join them. The body thread parks the servos on
    /// its way out.
    pub fn shutdown(self) {
        info!("Robot runtime shutting down");
        // Release: loops that observe false also see everything before it.
        self.shared.is_running.store(false, Ordering::Release);
        for (name, handle) in self.threads {
            let timeout = if name == "body" {
                BODY_JOIN_TIMEOUT
            } else {
                JOIN_TIMEOUT
            };
            if let Err(e) = handle.join_timeout(timeout) {
                if name == "body" {
                    error!("Failed to join body thread, servos left unparked: {:?}", e);
                } else {
                    warn!("Failed to join {} thread: {:?}", name, e);
                }
            }
        }
        info!("Robot runtime stopped");
    }
}

fn vision_loop(
    mut perception: impl Perception,
    mut debouncer: EmotionDebouncer,
    shared: Arc<Shared>,
    center_tolerance: f64,
) {
    while shared.is_running.load(Ordering::Acquire) {
        // The camera shows our own gesture while reacting; don't feed
        // that back into the classifier.
        let state = shared.status.load().state;
        if matches!(state, RobotState::Emotion(_)) {
            debouncer.clear();
            spin_sleep::sleep(LOOP_PERIOD);
            continue;
        }

        if !perception.next_frame() {
            spin_sleep::sleep(LOOP_PERIOD);
            continue;
        }

        match perception.detect_face() {
            Some(face) => {
                shared.face_present.store(true, Ordering::Release);
                shared.displacement.put(face.displacement());

                // Expressions are only trusted on a face we are actually
                // looking at.
                if !face.is_centered(center_tolerance) {
                    debouncer.clear();
                } else if let Some((emotion, confidence)) = perception.detect_emotion() {
                    if let Some(event) = debouncer.observe(emotion, confidence, Instant::now()) {
                        debug!(
                            "Emotion committed: {} ({:.2})",
                            event.emotion, event.confidence
                        );
                        shared
                            .coordinator
                            .lock()
                            .request(RobotState::Emotion(event.emotion));
                    }
                }
            }
            None => {
                shared.face_present.store(false, Ordering::Release);
                debouncer.clear();
            }
        }

        spin_sleep::sleep(LOOP_PERIOD);
    }
    debug!("Vision loop exited");
}

fn decision_loop(shared: Arc<Shared>, transition_tx: Sender<Transition>, tick: Duration) {
    while shared.is_running.load(Ordering::Acquire) {
        let face_present = shared.face_present.load(Ordering::Acquire);
        let sequence_running = shared.sequence_running.load(Ordering::Acquire);

        let transition =
            shared
                .coordinator
                .lock()
                .tick(Instant::now(), face_present, sequence_running);
        if let Some(transition) = transition {
            if let RobotState::Emotion(emotion) = transition.to {
                *shared.last_emotion.lock() = Some(emotion);
                shared.emotion_seq.fetch_add(1, Ordering::Release);
            }
            // A full presentation queue means the sink is stuck; dropping
            // a transition beats stalling the state machine.
            if transition_tx.try_send(transition).is_err() {
                warn!("Presentation queue full, dropped {:?}", transition);
            }
        }

        spin_sleep::sleep(tick);
    }
    debug!("Decision loop exited");
}

fn body_loop<B: ServoBus>(
    mut body: Body<B>,
    shared: Arc<Shared>,
    jobs: SharedSlot<BodyJob>,
    fidget_interval: Duration,
    fidget_probability: f64,
    center_tolerance: f64,
) {
    let mut rng = rand::thread_rng();
    let mut last_performed_seq = 0u64;
    let mut last_fidget = Instant::now();

    while shared.is_running.load(Ordering::Acquire) {
        if let Some(job) = jobs.take() {
            let result = run_job(&mut body, &shared, job);
            if let Err(e) = result {
                handle_body_error(&shared, e);
            }
        }

        let state = shared.coordinator.lock().state();
        match state {
            RobotState::Emotion(emotion) => {
                let seq = shared.emotion_seq.load(Ordering::Acquire);
                if seq != last_performed_seq {
                    last_performed_seq = seq;
                    shared.sequence_running.store(true, Ordering::Release);
                    let result = gesture::perform(&mut body, emotion);
                    shared.sequence_running.store(false, Ordering::Release);
                    if let Err(e) = result {
                        handle_body_error(&shared, e);
                    }
                }
            }
            RobotState::Tracking => {
                if let Some(displacement) = shared.displacement.take() {
                    if displacement.abs() > center_tolerance {
                        if let Err(e) = gesture::track_nudge(&mut body, displacement) {
                            handle_body_error(&shared, e);
                        }
                    }
                }
                last_fidget = Instant::now();
            }
            RobotState::Idle => {
                if last_fidget.elapsed() >= fidget_interval {
                    last_fidget = Instant::now();
                    shared.sequence_running.store(true, Ordering::Release);
                    let result = gesture::idle_fidget(&mut body, &mut rng, fidget_probability);
                    shared.sequence_running.store(false, Ordering::Release);
                    if let Err(e) = result {
                        handle_body_error(&shared, e);
                    }
                }
            }
        }

        publish_status(&body, &shared, state);
        spin_sleep::sleep(LOOP_PERIOD);
    }

    body.shutdown();
    debug!("Body loop exited");
}

fn run_job<B: ServoBus>(
    body: &mut Body<B>,
    shared: &Shared,
    job: BodyJob,
) -> Result<(), BodyError> {
    info!("Running body job {:?}", job);
    shared.sequence_running.store(true, Ordering::Release);
    let result = match job {
        BodyJob::Home => {
            body.move_home();
            Ok(())
        }
        BodyJob::LookUp => gesture::look_up(body),
        BodyJob::LookNeutral => gesture::look_neutral(body),
    };
    shared.sequence_running.store(false, Ordering::Release);
    result
}

fn publish_status<B: ServoBus>(body: &Body<B>, shared: &Shared, state: RobotState) {
    // Tracked values only; no bus traffic for a status snapshot.
    let positions =
        [Joint::Base, Joint::Torso, Joint::Head].map(|j| body.servo(j).tracked);
    shared.status.store(Arc::new(StatusReport {
        state,
        current_emotion: *shared.last_emotion.lock(),
        face_present: shared.face_present.load(Ordering::Acquire),
        sequence_running: shared.sequence_running.load(Ordering::Acquire),
        positions,
    }));
}

fn handle_body_error(shared: &Shared, error: BodyError) {
    if is_fatal(&error) {
        error!("Fatal body error, stopping runtime: {}", error);
        // Release: cleanup writes become visible with the flag.
        shared.is_running.store(false, Ordering::Release);
    } else {
        warn!("Body error, returning to idle: {}", error);
        shared.coordinator.lock().request(RobotState::Idle);
    }
}

fn is_fatal(error: &BodyError) -> bool {
    match error {
        BodyError::Bus(BusError::Device(e)) => e.is_fatal(),
        BodyError::Bus(BusError::NotOpen) => true,
        _ => false,
    }
}

fn presentation_loop(
    mut sink: impl PresentationSink,
    transition_rx: Receiver<Transition>,
    shared: Arc<Shared>,
) {
    while shared.is_running.load(Ordering::Acquire) {
        match transition_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(transition) => sink.on_transition(transition),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Presentation loop exited");
}
