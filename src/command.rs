use serde::Deserialize;
use tracing::info;

use crate::bus::ServoBus;
use crate::error::RobotError;
use crate::gait::Phase;
use crate::robot::Robot;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Move every servo to the given pose.
    State { name: Option<String>, angles: Vec<f64> },
    Walk,
    Stop,
}

#[derive(Debug, Deserialize)]
struct CommandMessage {
    #[serde(rename = "type")]
    msg_type: String,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StateData {
    name: Option<String>,
    angles: Vec<f64>,
}

impl Command {
    /// Decodes `{"type": .., "data": ..}` as sent by the operator console.
    pub fn decode(text: &str) -> Result<Self, RobotError> {
        let message: CommandMessage =
            serde_json::from_str(text).map_err(|e| RobotError::MalformedMessage(e.to_string()))?;

        match message.msg_type.as_str() {
            "state" => {
                let data = message
                    .data
                    .ok_or_else(|| RobotError::MalformedMessage("state without data".to_string()))?;
                let state: StateData = serde_json::from_value(data)
                    .map_err(|e| RobotError::MalformedMessage(e.to_string()))?;
                Ok(Command::State {
                    name: state.name,
                    angles: state.angles,
                })
            }
            "walk" => Ok(Command::Walk),
            "stop" => Ok(Command::Stop),
            _ => Err(RobotError::UnknownCommand(message.msg_type)),
        }
    }
}

/// Routes a command to the servos or the gait player.
///
/// A valid direct pose stops any walk in progress first, otherwise the next
/// gait tick would overwrite it. A rejected pose leaves the walk running.
pub fn dispatch<B: ServoBus>(robot: &mut Robot<B>, command: Command) -> Result<(), RobotError> {
    match command {
        Command::State { name, angles } => {
            robot.bank().check_pose(&angles)?;
            if robot.sequencer().phase() == Phase::Running {
                info!("Direct pose received, stopping walk");
                robot.sequencer_mut().stop();
            }
            info!("Applying pose {}", name.as_deref().unwrap_or("<unnamed>"));
            robot.bank_mut().set_pose(&angles)
        }
        Command::Walk => {
            info!("Walking");
            robot.sequencer_mut().start();
            Ok(())
        }
        Command::Stop => {
            info!("Stopping");
            robot.sequencer_mut().stop();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_commands() {
        assert_eq!(Command::decode(r#"{"type":"walk"}"#).unwrap(), Command::Walk);
        assert_eq!(Command::decode(r#"{"type":"stop"}"#).unwrap(), Command::Stop);
        assert_eq!(
            Command::decode(r#"{"type":"state","data":{"name":"Step 1","angles":[1,2.5]}}"#).unwrap(),
            Command::State {
                name: Some("Step 1".to_string()),
                angles: vec![1.0, 2.5]
            }
        );
        assert_eq!(
            Command::decode(r#"{"type":"state","data":{"angles":[]}}"#).unwrap(),
            Command::State {
                name: None,
                angles: vec![]
            }
        );
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        assert!(matches!(
            Command::decode(r#"{"type":"dance"}"#),
            Err(RobotError::UnknownCommand(name)) if name == "dance"
        ));
    }

    #[test]
    fn malformed_payloads() {
        for text in [
            "not json",
            r#"{"data":{}}"#,
            r#"{"type":7}"#,
            r#"{"type":"state"}"#,
            r#"{"type":"state","data":{"angles":"90"}}"#,
        ] {
            assert!(
                matches!(Command::decode(text), Err(RobotError::MalformedMessage(_))),
                "{text}"
            );
        }
    }
}
