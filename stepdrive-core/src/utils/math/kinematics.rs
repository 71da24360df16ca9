//! Kinematics for two-wheel differential drives.
//!
//! `DriveKinematics` maps a (translation, rotation) command to per-wheel RPM
//! and back. Convention: positive rotation yaws counter-clockwise seen from
//! above, i.e. the right wheel runs faster than the left one.
//!
//! # Example
//! ```rust
//! use stepdrive_core::utils::math::kinematics::DriveKinematics;
//! let kin = DriveKinematics::new(0.5, 600.0);
//! let wheels = kin.wheel_rpms(50.0, 20.0);
//! assert_eq!((wheels.left, wheels.right), (40.0, 60.0));
//! ```

use serde::{Deserialize, Serialize};

/// Signed target speed of each wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelRpms {
    pub left: f32,
    pub right: f32,
}

impl WheelRpms {
    pub fn new(
        left: f32,
        right: f32,
    ) -> Self {
        Self { left, right }
    }

    /// Right minus left.
    pub fn differential(&self) -> f32 {
        self.right - self.left
    }
}

/// `left = translation - rotation * k`, `right = translation + rotation * k`.
///
/// `k` is the track-width factor; 0.5 makes `rotation` the RPM differential.
pub fn trans_rot_to_rpm(
    translation: f32,
    rotation: f32,
    track_width_factor: f32,
) -> (f32, f32) {
    let half = rotation * track_width_factor;
    (translation - half, translation + half)
}

/// Differential-drive geometry plus the wheel speed ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveKinematics {
    track_width_factor: f32,
    max_rpm: f32,
}

impl DriveKinematics {
    pub fn new(
        track_width_factor: f32,
        max_rpm: f32,
    ) -> Self {
        Self {
            track_width_factor,
            max_rpm,
        }
    }

    pub fn track_width_factor(&self) -> f32 {
        self.track_width_factor
    }

    pub fn max_rpm(&self) -> f32 {
        self.max_rpm
    }

    /// Wheel speeds for a body command, saturated to `max_rpm`.
    pub fn wheel_rpms(
        &self,
        translation: f32,
        rotation: f32,
    ) -> WheelRpms {
        let (left, right) = trans_rot_to_rpm(
            finite_or_zero(translation),
            finite_or_zero(rotation),
            self.track_width_factor,
        );
        self.saturate(WheelRpms { left, right })
    }

    /// Recover `(translation, rotation)` from wheel speeds.
    pub fn body_velocity(
        &self,
        wheels: WheelRpms,
    ) -> (f32, f32) {
        let translation = (wheels.left + wheels.right) / 2.0;
        let rotation = wheels.differential() / (2.0 * self.track_width_factor);
        (translation, rotation)
    }

    /// Scale both wheels by the same factor so neither exceeds `max_rpm`.
    ///
    /// The ratio between the wheels, and so the turning curvature, is kept.
    /// Saturation is silent; non-finite speeds become 0.
    pub fn saturate(
        &self,
        wheels: WheelRpms,
    ) -> WheelRpms {
        let left = finite_or_zero(wheels.left);
        let right = finite_or_zero(wheels.right);
        let peak = libm::fabsf(left).max(libm::fabsf(right));
        if peak <= self.max_rpm {
            return WheelRpms { left, right };
        }
        let scale = self.max_rpm / peak;
        tracing::debug!(left, right, scale, "wheel speeds saturated");
        WheelRpms {
            left: left * scale,
            right: right * scale,
        }
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!(value = v, "non-finite drive speed replaced by 0");
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kin() -> DriveKinematics {
        DriveKinematics::new(0.5, 600.0)
    }

    #[test]
    fn zero_rotation_gives_equal_wheels() {
        let w = kin().wheel_rpms(50.0, 0.0);
        assert_eq!(w.left, 50.0);
        assert_eq!(w.right, 50.0);
    }

    #[test]
    fn zero_translation_spins_in_place() {
        for rot in [-80.0, -1.0, 3.5, 120.0] {
            let w = kin().wheel_rpms(0.0, rot);
            assert_eq!(w.left, -w.right);
            assert!(w.left != 0.0);
        }
    }

    #[test]
    fn positive_rotation_speeds_up_right_wheel() {
        let w = kin().wheel_rpms(50.0, 30.0);
        assert!(w.right > w.left);
        assert_eq!(w.differential(), 30.0);
    }

    #[test]
    fn differential_grows_with_rotation() {
        let mut last = f32::NEG_INFINITY;
        for rot in -100..100 {
            let d = kin().wheel_rpms(50.0, rot as f32).differential();
            assert!(d > last, "rot {} gave {} after {}", rot, d, last);
            last = d;
        }
    }

    #[test]
    fn saturation_keeps_ratio() {
        let w = kin().wheel_rpms(1000.0, 400.0);
        assert_eq!(w.right, 600.0);
        let ratio = w.left / w.right;
        assert!(libm::fabsf(ratio - 800.0 / 1200.0) < 1e-6);
    }

    #[test]
    fn non_finite_input_is_zeroed() {
        let w = kin().wheel_rpms(f32::NAN, 10.0);
        assert_eq!((w.left, w.right), (-5.0, 5.0));
    }

    #[test]
    fn round_trip_body_velocity() {
        let k = DriveKinematics::new(0.8, 600.0);
        let (t, r) = k.body_velocity(k.wheel_rpms(42.0, -17.0));
        assert!(libm::fabsf(t - 42.0) < 1e-4);
        assert!(libm::fabsf(r + 17.0) < 1e-4);
    }
}
