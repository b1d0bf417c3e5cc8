//! # Deskbot Servo Bus Layer
//!
//! Hardware abstraction for the half-duplex servo bus. The actual packet
//! transport lives behind the [`ServoBus`] trait; everything above this
//! layer speaks in register reads and writes against the AX-12A control
//! table.

use thiserror::Error;

pub mod mock;

pub use mock::MockBus;

/// AX-12A control table addresses.
///
/// Only the registers the robot actually touches are listed; the full table
/// has many more entries.
pub mod control_table {
    /// CW angle limit (two bytes). Together with [`CCW_ANGLE_LIMIT`] this
    /// selects the operating mode: both zero means continuous rotation.
    pub const CW_ANGLE_LIMIT: u8 = 6;
    /// CCW angle limit (two bytes).
    pub const CCW_ANGLE_LIMIT: u8 = 8;
    /// Torque enable (one byte, 0 or 1).
    pub const TORQUE_ENABLE: u8 = 24;
    /// Goal position (two bytes, 0-1023).
    pub const GOAL_POSITION: u8 = 30;
    /// Moving speed (two bytes). In continuous mode bit 10 is the
    /// direction bit and bits 0-9 the magnitude.
    pub const MOVING_SPEED: u8 = 32;
    /// Torque limit (two bytes, 0-1023).
    pub const TORQUE_LIMIT: u8 = 34;
    /// Present position (two bytes). Only meaningful with angle limits set.
    pub const PRESENT_POSITION: u8 = 36;
    /// Moving flag (one byte).
    pub const MOVING: u8 = 46;
}

/// Minimum encoder position.
pub const POSITION_MIN: u16 = 0;
/// Maximum encoder position (10-bit scale).
pub const POSITION_MAX: u16 = 1023;
/// Maximum moving-speed magnitude.
pub const SPEED_MAX: u16 = 1023;
/// Centered encoder value used as the home reference.
pub const HOME_POSITION: u16 = 512;

/// Bus layer unified error type.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] BusDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Checksum mismatch on status packet from servo {id}")]
    ChecksumMismatch { id: u8 },
    #[error("Bus not opened")]
    NotOpen,
}

/// Structured classification for device/backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    InvalidResponse,
}

/// Structured device error.
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct BusDeviceError {
    pub kind: BusDeviceErrorKind,
    pub message: String,
}

impl BusDeviceError {
    pub fn new(kind: BusDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            BusDeviceErrorKind::NoDevice
                | BusDeviceErrorKind::AccessDenied
                | BusDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for BusDeviceError {
    fn from(message: String) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for BusDeviceError {
    fn from(message: &str) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

/// Register-level access to one daisy-chained servo bus.
///
/// A single call maps to a single instruction packet on the wire. All calls
/// are synchronous; the bus is half duplex, so there is never more than one
/// outstanding transaction.
pub trait ServoBus {
    /// Write a two-byte register. One-byte registers accept the low byte.
    fn write_register(&mut self, id: u8, addr: u8, value: u16) -> Result<(), BusError>;

    /// Read a two-byte register.
    fn read_register(&mut self, id: u8, addr: u8) -> Result<u16, BusError>;

    /// Ping a servo. `Ok(false)` means the servo did not answer; transport
    /// faults are still errors.
    fn ping(&mut self, id: u8) -> Result<bool, BusError>;
}

/// Probe `ids` and return the subset that answered a ping.
///
/// Per-servo transport errors are treated the same as a missing servo: the
/// caller decides whether an empty roster is fatal.
pub fn scan(bus: &mut impl ServoBus, ids: &[u8]) -> Vec<u8> {
    let mut found = Vec::with_capacity(ids.len());
    for &id in ids {
        match bus.ping(id) {
            Ok(true) => {
                tracing::info!("Found servo ID {}", id);
                found.push(id);
            }
            Ok(false) => {
                tracing::debug!("Servo ID {} did not answer ping", id);
            }
            Err(e) => {
                tracing::warn!("Ping failed for servo ID {}: {}", id, e);
            }
        }
    }
    found
}
