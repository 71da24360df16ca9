use std::{
    convert::Infallible,
    io::{self, BufRead},
    thread,
    time::Duration,
};

use clap::Parser;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use embedded_hal_mock::eh1::delay::StdSleep;
use static_cell::StaticCell;
use stepdrive_core::utils::{DiffDrive, DriveCommand, DriveConfig, SystemClock};
use tracing::{error, info, trace, warn};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// steps per wheel revolution, multiple of 4
    #[clap(long, default_value_t = 12)]
    steps: u16,
    /// wheel speed ceiling in RPM
    #[clap(long, default_value_t = 600.0)]
    max_rpm: f32,
    /// replay the bench sequence instead of reading JSON commands from stdin
    #[clap(long)]
    demo: bool,
}

const RIGHT_PINS: [&str; 4] = ["R A+", "R B+", "R A-", "R B-"];
const LEFT_PINS: [&str; 4] = ["L A+", "L B+", "L A-", "L B-"];

/// Coil pin that logs duty changes instead of driving a PWM slice.
struct LogPwm {
    name: &'static str,
    duty: u16,
}

impl ErrorType for LogPwm {
    type Error = Infallible;
}

impl SetDutyCycle for LogPwm {
    fn max_duty_cycle(&self) -> u16 {
        1000
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if duty != self.duty {
            trace!(pin = self.name, duty, "coil");
            self.duty = duty;
        }
        Ok(())
    }
}

fn coil_pins(names: [&'static str; 4]) -> [LogPwm; 4] {
    names.map(|name| LogPwm { name, duty: u16::MAX })
}

static DRIVE: StaticCell<DiffDrive<LogPwm>> = StaticCell::new();

/// Straight-ish run, a rotation sweep at constant translation, then stop.
fn demo(drive: &DiffDrive<LogPwm>) {
    drive.set_rpm(-30.0, 50.0);
    thread::sleep(Duration::from_secs(1));

    for rot in -100..100 {
        drive.set_trans_rot(50.0, rot as f32);
        thread::sleep(Duration::from_millis(50));
    }

    thread::sleep(Duration::from_secs(1));
    info!(positions = ?drive.positions(), "demo finished");
}

/// One JSON `DriveCommand` per line until EOF.
fn serve_stdin(drive: &DiffDrive<LogPwm>) -> io::Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DriveCommand>(line) {
            Ok(cmd) => {
                if let Err(e) = drive.execute_command(cmd) {
                    error!("drive command failed: {}", e);
                }
            }
            Err(e) => warn!("ignoring {:?}: {}", line, e),
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts: Opts = Opts::parse();

    let mut config = DriveConfig::with_steps(opts.steps);
    config.max_rpm = opts.max_rpm;
    let drive = match DiffDrive::with_config(coil_pins(RIGHT_PINS), coil_pins(LEFT_PINS), config) {
        Ok(drive) => &*DRIVE.init(drive),
        Err(e) => {
            error!("invalid drive configuration: {}", e);
            std::process::exit(2);
        }
    };

    let worker = thread::spawn(move || drive.task_loop(&SystemClock, &mut StdSleep::new()));

    if opts.demo {
        demo(drive);
    } else if let Err(e) = serve_stdin(drive) {
        error!("stdin closed: {}", e);
    }

    if let Err(e) = drive.stop() {
        error!("failed to stop drive: {}", e);
    }
    drive.shutdown();
    match worker.join() {
        Ok(Ok(())) => info!("drive task loop finished"),
        Ok(Err(e)) => error!("drive task loop failed: {}", e),
        Err(_) => error!("drive task loop panicked"),
    }
}
