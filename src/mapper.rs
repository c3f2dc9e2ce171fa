use crate::calibration::ActuatorConfig;

pub const MIN_ANGLE: f64 = 0.0;
pub const MAX_ANGLE: f64 = 180.0;

/// Converts a logical angle in `[0, 180]` to the servo's pulse width.
///
/// Inverted servos are flipped before scaling so they still cover their
/// whole measured range. The caller is responsible for range checking.
pub fn map(config: &ActuatorConfig, angle: f64) -> u16 {
    let effective = if config.invert { MAX_ANGLE - angle } else { angle };
    let min = config.min_pulse as f64;
    let max = config.max_pulse as f64;

    let output = (effective - MIN_ANGLE) * (max - min) / (MAX_ANGLE - MIN_ANGLE) + min;
    output.round() as u16
}
