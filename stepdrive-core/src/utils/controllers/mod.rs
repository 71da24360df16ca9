//! Module Exports
//!
//! This file exports the motor control stack, leaves first.
//!
//! - `sequencer`: coil patterns and microstepping for one motor.
//! - `clock`: time source and per-motor step timing.
//! - `stepper`: velocity control of one motor (caller- or self-paced).
//! - `ddrive`: two-wheel differential drive and its task loop.

pub mod clock;
pub mod ddrive;
pub mod sequencer;
pub mod stepper;

pub use clock::{Clock, MotionClock, SystemClock};
pub use ddrive::{DiffDrive, DriveState};
pub use sequencer::StepSequencer;
use serde::{Deserialize, Serialize};
pub use stepper::Stepper;

/// Drive commands as they arrive from a host link.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dc", rename_all = "snake_case")] // dc = drive command
pub enum DriveCommand {
    /// Signed speed of each wheel.
    Rpm { left: f32, right: f32 },
    /// Translation plus counter-clockwise rotation.
    TransRot { trans: f32, rot: f32 },
    /// Stop and release the coils.
    Stop,
}
