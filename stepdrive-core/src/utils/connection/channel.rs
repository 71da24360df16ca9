//! Latest-value command channel for the differential drive.
//!
//! Setters and the task loop run on different execution contexts. Both wheel
//! targets live in one `DriveTargets` value that is replaced and copied out
//! whole inside a critical section, so the loop never sees a half-written
//! left/right pair or a direction that does not match its magnitude.

use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use serde::{Deserialize, Serialize};

use crate::utils::math::kinematics::WheelRpms;

/// Speed and direction of one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandedVelocity {
    /// RPM, never negative.
    pub magnitude: f32,
    pub forward: bool,
}

impl Default for CommandedVelocity {
    fn default() -> Self {
        Self {
            magnitude: 0.0,
            forward: true,
        }
    }
}

impl CommandedVelocity {
    pub fn from_rpm(rpm: f32) -> Self {
        Self {
            magnitude: libm::fabsf(rpm),
            forward: !rpm.is_sign_negative(),
        }
    }

    /// Signed RPM.
    pub fn rpm(&self) -> f32 {
        if self.forward {
            self.magnitude
        } else {
            -self.magnitude
        }
    }
}

/// Snapshot of everything the task loop needs to drive both wheels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveTargets {
    pub left: CommandedVelocity,
    pub right: CommandedVelocity,
    /// Coils must be released.
    pub stopped: bool,
    /// Bumped on every write; lets the loop skip unchanged targets.
    pub sequence: u32,
}

impl DriveTargets {
    pub fn wheel_rpms(&self) -> WheelRpms {
        WheelRpms::new(self.left.rpm(), self.right.rpm())
    }
}

/// Channel shared by the drive setters and the task loop. Last write wins.
pub struct CommandChannel {
    targets: Mutex<CriticalSectionRawMutex, Cell<DriveTargets>>,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel {
    /// Zero speed, not stopped. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            targets: Mutex::new(Cell::new(DriveTargets {
                left: CommandedVelocity {
                    magnitude: 0.0,
                    forward: true,
                },
                right: CommandedVelocity {
                    magnitude: 0.0,
                    forward: true,
                },
                stopped: false,
                sequence: 0,
            })),
        }
    }

    /// Publish new wheel speeds, clearing a pending stop. Returns the sequence
    /// number of the write.
    pub fn publish_rpm(
        &self,
        wheels: WheelRpms,
    ) -> u32 {
        self.update(|t| DriveTargets {
            left: CommandedVelocity::from_rpm(wheels.left),
            right: CommandedVelocity::from_rpm(wheels.right),
            stopped: false,
            sequence: t.sequence.wrapping_add(1),
        })
    }

    /// Publish a stop: zero speed on both wheels, coils released.
    pub fn publish_stop(&self) -> u32 {
        self.update(|t| DriveTargets {
            left: CommandedVelocity::default(),
            right: CommandedVelocity::default(),
            stopped: true,
            sequence: t.sequence.wrapping_add(1),
        })
    }

    /// Copy of the latest targets.
    pub fn latest(&self) -> DriveTargets {
        self.targets.lock(|cell| cell.get())
    }

    fn update<F>(
        &self,
        f: F,
    ) -> u32
    where
        F: FnOnce(DriveTargets) -> DriveTargets,
    {
        self.targets.lock(|cell| {
            let next = f(cell.get());
            cell.set(next);
            next.sequence
        })
    }
}
