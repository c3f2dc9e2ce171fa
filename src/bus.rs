use rppal::i2c::I2c;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("i2c: {0}")]
    I2c(#[from] rppal::i2c::Error),
    #[error("channel {0} not available on this bus")]
    NoSuchChannel(usize),
}

/// Destination of calibrated servo commands.
///
/// Implementations are called with the robot lock held, so they never see
/// two writes at once.
pub trait ServoBus: Send {
    fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError>;
}

impl<B: ServoBus + ?Sized> ServoBus for Box<B> {
    fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError> {
        (**self).write_actuator(index, pulse_us)
    }
}

pub const PCA9685_ADDRESS: u16 = 0x40;
pub const PWM_FREQUENCY: u32 = 50;

const PCA9685_CHANNELS: usize = 16;
const PCA9685_OSCILLATOR_HZ: u32 = 25_000_000;
const PCA9685_RESOLUTION: u32 = 4096;

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const LED0_ON_L: u8 = 0x06;
const PRESCALE: u8 = 0xFE;

const MODE1_SLEEP: u8 = 0x10;
const MODE1_AUTO_INCREMENT: u8 = 0x20;
const MODE1_RESTART: u8 = 0x80;
const MODE2_OUTDRV: u8 = 0x04;

/// PCA9685 16-channel PWM controller on the Raspberry Pi I2C bus.
pub struct Pca9685Bus {
    i2c: I2c,
}

impl Pca9685Bus {
    pub fn new(bus: u8, address: u16) -> Result<Self, BusError> {
        let mut i2c = I2c::with_bus(bus)?;
        i2c.set_slave_address(address)?;

        let prescale = (PCA9685_OSCILLATOR_HZ as f64 / (PCA9685_RESOLUTION * PWM_FREQUENCY) as f64)
            .round() as u8
            - 1;

        // Prescale can only be written while the oscillator sleeps.
        i2c.smbus_write_byte(MODE1, MODE1_SLEEP)?;
        i2c.smbus_write_byte(PRESCALE, prescale)?;
        i2c.smbus_write_byte(MODE2, MODE2_OUTDRV)?;
        i2c.smbus_write_byte(MODE1, MODE1_AUTO_INCREMENT)?;
        thread::sleep(Duration::from_micros(500));
        i2c.smbus_write_byte(MODE1, MODE1_AUTO_INCREMENT | MODE1_RESTART)?;

        info!(
            "PCA9685 initialized on I2C bus {} at {:#04x}, {}Hz (prescale {})",
            bus, address, PWM_FREQUENCY, prescale
        );
        Ok(Pca9685Bus { i2c })
    }
}

/// Converts a pulse width to the PCA9685 12-bit off count.
pub fn pulse_to_ticks(pulse_us: u16) -> u16 {
    let period_us = 1_000_000 / PWM_FREQUENCY;
    let ticks = (pulse_us as u32 * PCA9685_RESOLUTION + period_us / 2) / period_us;
    ticks.min(PCA9685_RESOLUTION - 1) as u16
}

impl ServoBus for Pca9685Bus {
    fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError> {
        if index >= PCA9685_CHANNELS {
            return Err(BusError::NoSuchChannel(index));
        }

        let off = pulse_to_ticks(pulse_us);
        let register = LED0_ON_L + 4 * index as u8;
        debug!("Servo {} pulse {}us ({} ticks)", index, pulse_us, off);
        self.i2c
            .write(&[register, 0, 0, (off & 0xff) as u8, (off >> 8) as u8])?;
        Ok(())
    }
}

/// Logs writes instead of driving hardware.
#[derive(Debug, Default)]
pub struct LoggingBus;

impl ServoBus for LoggingBus {
    fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError> {
        info!("Servo {} pulse {}us", index, pulse_us);
        Ok(())
    }
}

/// Keeps every write in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    writes: Arc<Mutex<Vec<(usize, u16)>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(usize, u16)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ServoBus for RecordingBus {
    fn write_actuator(&mut self, index: usize, pulse_us: u16) -> Result<(), BusError> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, pulse_us));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_ticks_at_fifty_hertz() {
        assert_eq!(pulse_to_ticks(0), 0);
        assert_eq!(pulse_to_ticks(1500), 307);
        assert_eq!(pulse_to_ticks(2600), 532);
        assert_eq!(pulse_to_ticks(u16::MAX), 4095);
    }

    #[test]
    fn recording_bus_clones_share_log() {
        let bus = RecordingBus::new();
        let mut writer = bus.clone();
        writer.write_actuator(3, 1200).unwrap();
        writer.write_actuator(4, 1800).unwrap();
        assert_eq!(bus.writes(), vec![(3, 1200), (4, 1800)]);
        bus.clear();
        assert!(writer.is_empty());
    }
}
