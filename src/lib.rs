pub mod bank;
pub mod bus;
pub mod calibration;
pub mod command;
pub mod controller;
pub mod error;
pub mod gait;
pub mod mapper;
pub mod robot;
pub mod websocket;

pub use bank::ActuatorBank;
pub use bus::{LoggingBus, Pca9685Bus, RecordingBus, ServoBus};
pub use calibration::{ActuatorConfig, CalibrationTable, ACTUATOR_COUNT};
pub use command::{dispatch, Command};
pub use controller::RobotController;
pub use error::RobotError;
pub use gait::{GaitSequencer, GaitTable, Keyframe, Phase};
pub use robot::Robot;
