use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Number of servos on the robot, two per leg.
pub const ACTUATOR_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    pub index: usize,
    pub min_pulse: u16, // Pulse width (us) at logical 0 degrees
    pub max_pulse: u16, // Pulse width (us) at logical 180 degrees
    pub invert: bool,   // Map angle as 180 - angle before scaling
}

impl ActuatorConfig {
    pub const fn new(index: usize, min_pulse: u16, max_pulse: u16, invert: bool) -> Self {
        ActuatorConfig {
            index,
            min_pulse,
            max_pulse,
            invert,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("expected {expected} actuators, found {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("actuator at position {position} has index {index}")]
    IndexMismatch { position: usize, index: usize },
    #[error("actuator {index}: min pulse {min_pulse} is not below max pulse {max_pulse}")]
    EmptyRange {
        index: usize,
        min_pulse: u16,
        max_pulse: u16,
    },
    #[error("failed to read calibration file: {0}")]
    Io(String),
    #[error("failed to parse calibration file: {0}")]
    Parse(String),
}

/// Measured travel limits of each servo, indexed by servo number.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    actuators: Vec<ActuatorConfig>,
}

impl CalibrationTable {
    pub fn new(actuators: Vec<ActuatorConfig>) -> Result<Self, CalibrationError> {
        if actuators.len() != ACTUATOR_COUNT {
            return Err(CalibrationError::WrongCount {
                expected: ACTUATOR_COUNT,
                actual: actuators.len(),
            });
        }

        for (position, actuator) in actuators.iter().enumerate() {
            if actuator.index != position {
                return Err(CalibrationError::IndexMismatch {
                    position,
                    index: actuator.index,
                });
            }
            if actuator.min_pulse >= actuator.max_pulse {
                return Err(CalibrationError::EmptyRange {
                    index: actuator.index,
                    min_pulse: actuator.min_pulse,
                    max_pulse: actuator.max_pulse,
                });
            }
        }

        Ok(CalibrationTable { actuators })
    }

    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let content = fs::read_to_string(path).map_err(|e| CalibrationError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CalibrationError> {
        let actuators: Vec<ActuatorConfig> =
            serde_json::from_str(content).map_err(|e| CalibrationError::Parse(e.to_string()))?;
        Self::new(actuators)
    }

    pub fn get(&self, index: usize) -> Option<&ActuatorConfig> {
        self.actuators.get(index)
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActuatorConfig> {
        self.actuators.iter()
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        // Stock servos travel 700-2600; a few were measured off by up to 200us.
        CalibrationTable {
            actuators: vec![
                ActuatorConfig::new(0, 650, 2550, false),
                ActuatorConfig::new(1, 700, 2600, false),
                ActuatorConfig::new(2, 550, 2450, false),
                ActuatorConfig::new(3, 700, 2600, true),
                ActuatorConfig::new(4, 700, 2600, false),
                ActuatorConfig::new(5, 700, 2600, true),
                ActuatorConfig::new(6, 700, 2600, true),
                ActuatorConfig::new(7, 500, 2400, true),
                ActuatorConfig::new(8, 700, 2600, true),
                ActuatorConfig::new(9, 800, 2700, false),
                ActuatorConfig::new(10, 700, 2600, true),
                ActuatorConfig::new(11, 700, 2600, false),
            ],
        }
    }
}
