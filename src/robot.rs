use tracing::{debug, warn};

use crate::bank::ActuatorBank;
use crate::bus::ServoBus;
use crate::calibration::CalibrationTable;
use crate::error::RobotError;
use crate::gait::{GaitSequencer, GaitTable, Tick};

/// Everything that makes up one robot: the servos and the gait player.
pub struct Robot<B: ServoBus> {
    bank: ActuatorBank<B>,
    sequencer: GaitSequencer,
}

impl<B: ServoBus> Robot<B> {
    pub fn new(calibration: CalibrationTable, gait: GaitTable, bus: B) -> Result<Self, RobotError> {
        Ok(Robot {
            bank: ActuatorBank::new(calibration, bus)?,
            sequencer: GaitSequencer::new(gait),
        })
    }

    /// Advances the gait by one step. A keyframe the bank rejects is logged
    /// and skipped so the next tick still plays.
    pub fn tick(&mut self) {
        let cursor = self.sequencer.cursor();
        match self.sequencer.tick() {
            Tick::Idle => {}
            Tick::LoopBack => debug!("Gait looping back"),
            Tick::Pose(keyframe) => {
                if let Err(e) = self.bank.set_pose(&keyframe.angles) {
                    warn!("Gait step {} ({}) failed: {}", cursor, keyframe.label, e);
                }
            }
        }
    }

    pub fn bank(&self) -> &ActuatorBank<B> {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut ActuatorBank<B> {
        &mut self.bank
    }

    pub fn sequencer(&self) -> &GaitSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut GaitSequencer {
        &mut self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;
    use crate::gait::{GaitStep, Keyframe, Phase};

    #[test]
    fn bad_keyframe_does_not_stall_the_gait() {
        let table = GaitTable::new(vec![
            GaitStep::Pose(Keyframe::new("rest", &[90.0; 12])),
            GaitStep::Pose(Keyframe::new("short", &[45.0; 11])),
            GaitStep::Pose(Keyframe::new("step", &[45.0; 12])),
            GaitStep::LoopPoint,
        ])
        .unwrap();
        let bus = RecordingBus::new();
        let mut robot = Robot::new(CalibrationTable::default(), table, bus.clone()).unwrap();
        bus.clear();

        robot.sequencer_mut().start();
        robot.tick();
        robot.tick();
        assert!(bus.is_empty());
        assert_eq!(robot.sequencer().cursor(), 2);

        robot.tick();
        assert_eq!(bus.len(), 12);
        assert_eq!(robot.bank().current_pose(), vec![45.0; 12]);
        assert_eq!(robot.sequencer().phase(), Phase::Running);
    }
}
