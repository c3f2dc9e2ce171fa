use tracing::debug;

use crate::bus::ServoBus;
use crate::calibration::CalibrationTable;
use crate::error::RobotError;
use crate::mapper::{self, MAX_ANGLE, MIN_ANGLE};

/// Angle every servo is driven to on start-up, and reported before the
/// first command.
pub const NEUTRAL_ANGLE: f64 = 90.0;

/// Owns the commanded pose and is the only writer to the servo bus.
pub struct ActuatorBank<B: ServoBus> {
    calibration: CalibrationTable,
    angles: Vec<Option<f64>>,
    bus: B,
}

impl<B: ServoBus> ActuatorBank<B> {
    /// Creates the bank and drives every servo to the neutral angle.
    pub fn new(calibration: CalibrationTable, bus: B) -> Result<Self, RobotError> {
        let count = calibration.len();
        let mut bank = ActuatorBank {
            calibration,
            angles: vec![None; count],
            bus,
        };

        for index in 0..count {
            bank.set_angle(index, NEUTRAL_ANGLE)?;
        }
        Ok(bank)
    }

    pub fn set_angle(&mut self, index: usize, angle: f64) -> Result<(), RobotError> {
        let count = self.angles.len();
        let config = self
            .calibration
            .get(index)
            .ok_or(RobotError::IndexOutOfRange { index, count })?;
        check_angle(index, angle)?;

        if self.angles[index] == Some(angle) {
            return Ok(());
        }

        let pulse = mapper::map(config, angle);
        debug!("Setting servo {} to angle {} ({}us)", index, angle, pulse);
        self.bus.write_actuator(index, pulse)?;
        self.angles[index] = Some(angle);
        Ok(())
    }

    /// Checks a pose without touching the bus.
    pub fn check_pose(&self, angles: &[f64]) -> Result<(), RobotError> {
        self.check_pose_size(angles)?;
        for (index, &angle) in angles.iter().enumerate() {
            check_angle(index, angle)?;
        }
        Ok(())
    }

    /// Applies a full pose in servo order. Stops at the first rejected angle;
    /// servos before it keep their new angle.
    pub fn set_pose(&mut self, angles: &[f64]) -> Result<(), RobotError> {
        self.check_pose_size(angles)?;
        for (index, &angle) in angles.iter().enumerate() {
            self.set_angle(index, angle)?;
        }
        Ok(())
    }

    fn check_pose_size(&self, angles: &[f64]) -> Result<(), RobotError> {
        if angles.len() != self.angles.len() {
            return Err(RobotError::PoseSizeMismatch {
                expected: self.angles.len(),
                actual: angles.len(),
            });
        }
        Ok(())
    }

    pub fn current_pose(&self) -> Vec<f64> {
        self.angles
            .iter()
            .map(|angle| angle.unwrap_or(NEUTRAL_ANGLE))
            .collect()
    }
}

fn check_angle(index: usize, angle: f64) -> Result<(), RobotError> {
    if !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
        return Err(RobotError::AngleOutOfRange { index, angle });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, RecordingBus};

    /// Records writes, but refuses every write to one servo once armed.
    struct FlakyBus {
        log: RecordingBus,
        broken: Option<usize>,
    }

    impl ServoBus for FlakyBus {
        fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError> {
            if self.broken == Some(index) {
                return Err(BusError::NoSuchChannel(index));
            }
            self.log.write_actuator(index, pulse_us)
        }
    }

    fn bank() -> (ActuatorBank<RecordingBus>, RecordingBus) {
        let bus = RecordingBus::new();
        let bank = ActuatorBank::new(CalibrationTable::default(), bus.clone()).unwrap();
        (bank, bus)
    }

    #[test]
    fn startup_drives_every_servo_to_neutral() {
        let (bank, bus) = bank();
        let writes = bus.writes();
        assert_eq!(writes.len(), 12);
        assert_eq!(writes[0], (0, 1600));
        assert_eq!(writes[3], (3, 1650));
        assert_eq!(writes[7], (7, 1450));
        assert_eq!(bank.current_pose(), vec![90.0; 12]);
    }

    #[test]
    fn set_angle_writes_calibrated_pulse() {
        let (mut bank, bus) = bank();
        bus.clear();
        bank.set_angle(0, 0.0).unwrap();
        bank.set_angle(3, 0.0).unwrap();
        assert_eq!(bus.writes(), vec![(0, 650), (3, 2600)]);
        assert_eq!(bank.current_pose()[0], 0.0);
    }

    #[test]
    fn repeated_angle_skips_bus_write() {
        let (mut bank, bus) = bank();
        bus.clear();
        bank.set_angle(5, 90.0).unwrap();
        assert!(bus.is_empty());
    }

    #[test]
    fn rejected_calls_leave_state_untouched() {
        let (mut bank, bus) = bank();
        bus.clear();

        assert!(matches!(
            bank.set_angle(12, 45.0),
            Err(RobotError::IndexOutOfRange { index: 12, count: 12 })
        ));
        assert!(matches!(
            bank.set_angle(usize::MAX, 45.0),
            Err(RobotError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            bank.set_angle(2, 181.0),
            Err(RobotError::AngleOutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            bank.set_angle(2, -0.5),
            Err(RobotError::AngleOutOfRange { .. })
        ));
        assert!(matches!(
            bank.set_angle(2, f64::NAN),
            Err(RobotError::AngleOutOfRange { .. })
        ));

        assert!(bus.is_empty());
        assert_eq!(bank.current_pose(), vec![90.0; 12]);
    }

    #[test]
    fn wrong_pose_size_writes_nothing() {
        let (mut bank, bus) = bank();
        bus.clear();

        for size in [11, 13] {
            assert!(matches!(
                bank.set_pose(&vec![45.0; size]),
                Err(RobotError::PoseSizeMismatch { expected: 12, actual }) if actual == size
            ));
        }
        assert!(bus.is_empty());
    }

    #[test]
    fn pose_stops_at_first_bad_angle() {
        let (mut bank, bus) = bank();
        bus.clear();

        let mut pose = vec![45.0; 12];
        pose[4] = 200.0;
        assert!(matches!(
            bank.set_pose(&pose),
            Err(RobotError::AngleOutOfRange { index: 4, .. })
        ));

        assert_eq!(bus.len(), 4);
        let current = bank.current_pose();
        assert_eq!(&current[..4], &[45.0; 4]);
        assert_eq!(&current[4..], &[90.0; 8]);
    }

    #[test]
    fn bus_failure_is_reported_and_keeps_old_angle() {
        let log = RecordingBus::new();
        let bus = FlakyBus {
            log: log.clone(),
            broken: None,
        };
        let mut bank = ActuatorBank::new(CalibrationTable::default(), bus).unwrap();
        bank.bus.broken = Some(6);
        log.clear();

        assert!(matches!(
            bank.set_angle(6, 30.0),
            Err(RobotError::Bus(BusError::NoSuchChannel(6)))
        ));
        assert_eq!(bank.current_pose(), vec![90.0; 12]);
        assert!(log.is_empty());

        assert!(matches!(
            bank.set_pose(&[30.0; 12]),
            Err(RobotError::Bus(BusError::NoSuchChannel(6)))
        ));
        assert_eq!(log.len(), 6);
        let current = bank.current_pose();
        assert_eq!(&current[..6], &[30.0; 6]);
        assert_eq!(&current[6..], &[90.0; 6]);
    }

    #[test]
    fn check_pose_never_writes() {
        let (bank, bus) = bank();
        bus.clear();

        let mut pose = vec![45.0; 12];
        assert!(bank.check_pose(&pose).is_ok());
        pose[9] = 180.5;
        assert!(matches!(
            bank.check_pose(&pose),
            Err(RobotError::AngleOutOfRange { index: 9, .. })
        ));
        assert!(matches!(
            bank.check_pose(&pose[..11]),
            Err(RobotError::PoseSizeMismatch { expected: 12, actual: 11 })
        ));
        assert!(bus.is_empty());
        assert_eq!(bank.current_pose(), vec![90.0; 12]);
    }
}
