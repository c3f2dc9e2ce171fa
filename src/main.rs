use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use hexapod::bus::{LoggingBus, Pca9685Bus, ServoBus, PCA9685_ADDRESS};
use hexapod::websocket::websocket_server;
use hexapod::{CalibrationTable, GaitTable, Robot, RobotController};

#[derive(Parser)]
#[command(about = "Hexapod servo controller")]
struct Opts {
    /// Address the operator websocket listens on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Calibration JSON: 12 entries of {index, min_pulse, max_pulse, invert}.
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Gait JSON as exported by the console, ending with {"name": "end"}.
    #[arg(long)]
    gait: Option<PathBuf>,

    /// Milliseconds between gait steps.
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,

    /// Log servo pulses instead of driving the PCA9685.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 1)]
    i2c_bus: u8,

    #[arg(long, default_value_t = PCA9685_ADDRESS, value_parser = parse_address)]
    i2c_address: u16,
}

fn parse_address(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid I2C address {value:?}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let opts = Opts::parse();

    info!("Starting hexapod controller");

    let calibration = match &opts.calibration {
        Some(path) => CalibrationTable::load(path)
            .with_context(|| format!("loading calibration from {}", path.display()))?,
        None => CalibrationTable::default(),
    };
    let gait = match &opts.gait {
        Some(path) => {
            GaitTable::load(path).with_context(|| format!("loading gait from {}", path.display()))?
        }
        None => GaitTable::default(),
    };
    info!("Loaded gait with {} steps", gait.len());

    let bus: Box<dyn ServoBus> = if opts.dry_run {
        Box::new(LoggingBus)
    } else {
        Box::new(Pca9685Bus::new(opts.i2c_bus, opts.i2c_address).context("opening PCA9685")?)
    };

    let robot = Robot::new(calibration, gait, bus).context("driving servos to neutral")?;
    let controller = RobotController::spawn(robot, Duration::from_millis(opts.tick_ms))
        .context("starting control loop")?;

    websocket_server(opts.listen.as_str(), controller.clone())
        .with_context(|| format!("serving on {}", opts.listen))?;

    controller.shutdown();
    Ok(())
}
