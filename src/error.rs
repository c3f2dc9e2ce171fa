use thiserror::Error;

use crate::bus::BusError;

/// Failures reported while applying commands. None of them are fatal: the
/// offending message or tick is dropped and the robot stays commandable.
#[derive(Debug, Error)]
pub enum RobotError {
    #[error("actuator index {index} out of range (0..{count})")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("angle {angle} for actuator {index} outside 0..=180")]
    AngleOutOfRange { index: usize, angle: f64 },
    #[error("pose has {actual} angles, expected {expected}")]
    PoseSizeMismatch { expected: usize, actual: usize },
    #[error("unknown command type {0:?}")]
    UnknownCommand(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("bus write failed: {0}")]
    Bus(#[from] BusError),
}
