//! Construction parameters for steppers and the differential drive.
//!
//! Every struct derives `Default` with the values the drive boards ship with,
//! and can be deserialized with missing fields falling back to those defaults.

use serde::{Deserialize, Serialize};

use crate::utils::error::ConfigError;

/// Coil patterns per revolution when the caller does not pick one.
pub const DEFAULT_STEPS_PER_REVOLUTION: u16 = 12;
/// Largest supported coil-pattern count.
pub const MAX_STEPS_PER_REVOLUTION: u16 = 1024;

/// Lowest coil duty used while stepping in rate mode (20%).
pub const DEFAULT_DUTY_MIN: f32 = 0.20;
/// Highest coil duty ever written (70%).
pub const DEFAULT_DUTY_MAX: f32 = 0.70;
/// RPM at which rate mode reaches `DEFAULT_DUTY_MAX`.
pub const DEFAULT_FULL_POWER_RPM: f32 = 400.0;
/// Steps a late motor may catch up in a burst.
pub const DEFAULT_MAX_BACKLOG_STEPS: u32 = 8;

/// Scale from rotation to half the wheel differential.
pub const DEFAULT_TRACK_WIDTH_FACTOR: f32 = 0.5;
/// Wheel speed ceiling applied to every drive command.
pub const DEFAULT_MAX_RPM: f32 = 600.0;
/// Longest sleep between two task loop iterations (µs).
pub const DEFAULT_POLL_PERIOD_US: u32 = 100;

/// Check that a coil-pattern count maps onto the sine pattern table.
pub fn check_steps_per_revolution(steps_per_revolution: u16) -> Result<(), ConfigError> {
    let n = steps_per_revolution;
    if n < 4 || n % 4 != 0 || n > MAX_STEPS_PER_REVOLUTION {
        return Err(ConfigError::StepsPerRevolution(n));
    }
    Ok(())
}

/// Fraction of the PWM range a coil may be driven with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyRange {
    pub min: f32,
    pub max: f32,
}

impl Default for DutyRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_DUTY_MIN,
            max: DEFAULT_DUTY_MAX,
        }
    }
}

impl DutyRange {
    /// Drive level for a single caller-paced step, `power` clamped to [0, 1].
    pub fn for_power(
        &self,
        power: f32,
    ) -> f32 {
        let power = if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) };
        power * self.max
    }

    /// Drive level for rate mode, rising linearly from `min` to `max` until
    /// `full_power_rpm`.
    pub fn for_rpm(
        &self,
        rpm: f32,
        full_power_rpm: f32,
    ) -> f32 {
        let t = (libm::fabsf(rpm) / full_power_rpm).clamp(0.0, 1.0);
        self.min + (self.max - self.min) * t
    }
}

/// Per-motor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    pub steps_per_revolution: u16,
    pub duty: DutyRange,
    pub full_power_rpm: f32,
    pub max_backlog_steps: u32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            duty: DutyRange::default(),
            full_power_rpm: DEFAULT_FULL_POWER_RPM,
            max_backlog_steps: DEFAULT_MAX_BACKLOG_STEPS,
        }
    }
}

impl StepperConfig {
    /// Default configuration with a different coil-pattern count.
    pub fn with_steps(steps_per_revolution: u16) -> Self {
        Self {
            steps_per_revolution,
            ..Self::default()
        }
    }

    /// Reject anything that would leave the sequencer without a pattern
    /// table or the drive level outside the PWM range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_steps_per_revolution(self.steps_per_revolution)?;
        let DutyRange { min, max } = self.duty;
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(ConfigError::DutyRange { min, max });
        }
        if !(self.full_power_rpm.is_finite() && self.full_power_rpm > 0.0) {
            return Err(ConfigError::InvalidParameter("full_power_rpm"));
        }
        Ok(())
    }
}

/// Configuration of a two-wheel differential drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Shared by both wheels.
    pub stepper: StepperConfig,
    pub track_width_factor: f32,
    pub max_rpm: f32,
    pub poll_period_us: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            stepper: StepperConfig::default(),
            track_width_factor: DEFAULT_TRACK_WIDTH_FACTOR,
            max_rpm: DEFAULT_MAX_RPM,
            poll_period_us: DEFAULT_POLL_PERIOD_US,
        }
    }
}

impl DriveConfig {
    pub fn with_steps(steps_per_revolution: u16) -> Self {
        Self {
            stepper: StepperConfig::with_steps(steps_per_revolution),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stepper.validate()?;
        if !(self.track_width_factor.is_finite() && self.track_width_factor > 0.0) {
            return Err(ConfigError::InvalidParameter("track_width_factor"));
        }
        if !(self.max_rpm.is_finite() && self.max_rpm > 0.0) {
            return Err(ConfigError::InvalidParameter("max_rpm"));
        }
        if self.poll_period_us == 0 {
            return Err(ConfigError::InvalidParameter("poll_period_us"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DriveConfig::default().validate().is_ok());
        assert_eq!(StepperConfig::default().steps_per_revolution, 12);
    }

    #[test]
    fn steps_must_be_multiple_of_four() {
        for n in [0, 2, 6, 13, 1028] {
            assert_eq!(
                StepperConfig::with_steps(n).validate(),
                Err(ConfigError::StepsPerRevolution(n))
            );
        }
        for n in [4, 12, 128, 1024] {
            assert!(StepperConfig::with_steps(n).validate().is_ok());
        }
    }

    #[test]
    fn inverted_duty_range_rejected() {
        let mut cfg = StepperConfig::default();
        cfg.duty = DutyRange { min: 0.8, max: 0.2 };
        assert!(matches!(cfg.validate(), Err(ConfigError::DutyRange { .. })));
    }

    #[test]
    fn power_is_clamped() {
        let duty = DutyRange::default();
        assert_eq!(duty.for_power(1.5), duty.max);
        assert_eq!(duty.for_power(-0.3), 0.0);
        assert_eq!(duty.for_power(f32::NAN), 0.0);
    }

    #[test]
    fn rpm_level_saturates_at_full_power() {
        let duty = DutyRange::default();
        assert!(libm::fabsf(duty.for_rpm(0.0, 300.0) - duty.min) < 1e-6);
        assert!(libm::fabsf(duty.for_rpm(-150.0, 300.0) - 0.45) < 1e-6);
        assert!(libm::fabsf(duty.for_rpm(900.0, 300.0) - duty.max) < 1e-6);
    }
}
