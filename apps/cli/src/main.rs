//! # Deskbot CLI
//!
//! Console frontend for the desktop robot. Runs the full runtime and
//! exposes an interactive prompt:
//!
//! ```bash
//! $ deskbot run --simulate
//! deskbot> status
//! deskbot> happy
//! deskbot> look up
//! deskbot> quit
//! ```
//!
//! Accepted prompt input: the emotion labels (`happy`, `angry`, `sad`,
//! `surprise`, `fear`), `status`, `home`, `look up`, `look down` and
//! `quit`. Anything else is ignored.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender};
use deskbot_body::{Body, Emotion};
use deskbot_bus::MockBus;
use deskbot_core::perception::ScriptedFrame;
use deskbot_core::{Command, Robot, RobotConfig, ScriptedPerception};
use tracing::{info, warn};

mod sink;

use sink::ConsoleSink;

/// Deskbot - emotionally reactive desktop robot
#[derive(Parser, Debug)]
#[command(name = "deskbot")]
#[command(about = "Control console for the deskbot desktop robot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the robot with the interactive prompt
    Run {
        /// Config file (missing file falls back to defaults)
        #[arg(short, long, default_value = "deskbot.toml")]
        config: PathBuf,

        /// Drive a simulated servo bus and scripted camera instead of
        /// real hardware
        #[arg(long)]
        simulate: bool,
    },

    /// Play one emotion gesture against the simulated bus and exit
    Gesture {
        /// Emotion label (happy, angry, sad, surprise, fear)
        emotion: String,
    },

    /// Print the effective configuration and exit
    Config {
        /// Config file (missing file falls back to defaults)
        #[arg(short, long, default_value = "deskbot.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deskbot=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Commands::Run { config, simulate } => run(&load_config(&config)?, simulate),
        Commands::Gesture { emotion } => play_gesture(&emotion),
        Commands::Config { config } => {
            println!("{:#?}", load_config(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: &PathBuf) -> Result<RobotConfig> {
    if path.exists() {
        RobotConfig::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        info!("No config at {}, using defaults", path.display());
        Ok(RobotConfig::default())
    }
}

fn run(config: &RobotConfig, simulate: bool) -> Result<()> {
    if !simulate {
        // Servo bus transports are provided by integrators; this binary
        // only ships the simulated one.
        bail!("no hardware transport available, run with --simulate");
    }

    let body = Body::new(MockBus::new(&roster_ids(config)), config.roster())
        .with_settle(Duration::from_millis(100));
    let robot = Robot::start(body, demo_perception(), ConsoleSink::default(), config)?;
    info!("Robot running, type 'quit' to exit");

    let (command_tx, command_rx) = crossbeam_channel::bounded::<Command>(8);
    spawn_prompt_reader(command_tx.clone());
    ctrlc::set_handler(move || {
        let _ = command_tx.try_send(Command::Quit);
    })
    .context("installing Ctrl-C handler")?;

    command_pump(&robot, &command_rx);
    robot.shutdown();
    Ok(())
}

/// Feed prompt lines into the command channel until stdin closes.
fn spawn_prompt_reader(command_tx: Sender<Command>) {
    std::thread::Builder::new()
        .name("deskbot-prompt".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match Command::parse(&line) {
                    Some(command) => {
                        let quit = command == Command::Quit;
                        if command_tx.send(command).is_err() || quit {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {}", line.trim()),
                }
            }
        })
        .ok();
}

fn command_pump(robot: &Robot, command_rx: &Receiver<Command>) {
    while robot.is_running() {
        match command_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Command::Quit) => break,
            Ok(Command::Status) => println!("{}", robot.status()),
            Ok(command) => robot.handle(command),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    if !robot.is_running() {
        warn!("Runtime stopped on its own");
    }
}

/// Scripted camera for bench-top runs: a face shows up, smiles, leaves.
fn demo_perception() -> ScriptedPerception {
    let mut script = Vec::new();
    for _ in 0..40 {
        script.push(ScriptedFrame::face_at(0.15));
    }
    for _ in 0..6 {
        script.push(ScriptedFrame::face_at(0.0).with_emotion(Emotion::Happy, 0.97));
    }
    for _ in 0..40 {
        script.push(ScriptedFrame::face_at(0.0));
    }
    ScriptedPerception::new(script)
}

fn play_gesture(label: &str) -> Result<()> {
    let emotion: Emotion = label
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown emotion '{label}'"))?;

    let config = RobotConfig::default();
    let mut body = Body::new(MockBus::new(&roster_ids(&config)), config.roster())
        .with_settle(Duration::from_millis(100));
    body.start()?;
    deskbot_body::gesture::perform(&mut body, emotion)?;
    body.shutdown();
    Ok(())
}

fn roster_ids(config: &RobotConfig) -> Vec<u8> {
    config.roster().iter().map(|s| s.id).collect()
}
