//! Utility re-exports for the stepper drive.
//!
//! This module re-exports the motor controllers, drive kinematics and the
//! command channel shared between callers and the drive task loop:
//!
//! - `connection`: command channel holding the latest per-wheel targets
//! - `controllers`: coil sequencing, step timing, steppers and the diff drive
//! - `math`: differential-drive kinematics
//! - `config`: construction parameters and their defaults
//! - `error`: configuration and runtime errors

pub mod config;
pub mod connection;
pub mod controllers;
pub mod error;
pub mod math;

pub use config::{DriveConfig, DutyRange, StepperConfig};
pub use connection::channel::{CommandChannel, CommandedVelocity, DriveTargets};
pub use controllers::{
    Clock, DiffDrive, DriveCommand, DriveState, MotionClock, StepSequencer, Stepper, SystemClock,
};
pub use embassy_time::{Duration, Instant};
pub use error::{ConfigError, DriveError};
pub use math::kinematics::{DriveKinematics, WheelRpms};
pub use math::kinematics::DriveKinematics as dk;
