//! Errors raised while building or running a drive.

use core::fmt;

/// Invalid construction parameters. Raised before any pin is touched, so a
/// running task loop never meets an undefined coil pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Only 2-wire and 4-wire coil hookups are supported.
    PinCount(usize),
    /// Steps per revolution must be a positive multiple of 4 within range.
    StepsPerRevolution(u16),
    DutyRange { min: f32, max: f32 },
    InvalidParameter(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::PinCount(n) => write!(f, "expected 2 or 4 coil pins, got {n}"),
            ConfigError::StepsPerRevolution(n) => {
                write!(f, "steps per revolution must be a multiple of 4 in 4..=1024, got {n}")
            }
            ConfigError::DutyRange { min, max } => {
                write!(f, "duty range {min}..{max} is not within 0..=1")
            }
            ConfigError::InvalidParameter(name) => write!(f, "invalid drive parameter `{name}`"),
        }
    }
}

/// Errors surfaced by steppers and the differential drive.
///
/// `E` is the error type of the coil pins.
#[derive(Debug, PartialEq)]
pub enum DriveError<E> {
    Config(ConfigError),
    Pin(E),
    /// `task_loop` was entered while another loop drives the same motors.
    AlreadyRunning,
}

impl<E> From<ConfigError> for DriveError<E> {
    fn from(err: ConfigError) -> Self {
        DriveError::Config(err)
    }
}

impl<E: fmt::Debug> fmt::Display for DriveError<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DriveError::Config(err) => write!(f, "configuration error: {err}"),
            DriveError::Pin(err) => write!(f, "coil pin error: {err:?}"),
            DriveError::AlreadyRunning => f.write_str("drive task loop is already running"),
        }
    }
}
