//! Velocity control of a single stepper motor.
//!
//! A `Stepper` pairs a `StepSequencer` with a `MotionClock` and supports two
//! calling conventions:
//!
//! - caller-paced: `step(direction, power)` moves one index right away and the
//!   caller owns the timing loop;
//! - self-paced: `set_rate(rpm)` stores a speed and `tick(now)` steps whenever
//!   the clock says a step is due.

use embassy_time::{Duration, Instant};
use embedded_hal::pwm::SetDutyCycle;

use crate::utils::{
    config::StepperConfig,
    controllers::{clock::MotionClock, sequencer::StepSequencer},
    error::DriveError,
};

/// One stepper motor under velocity control.
pub struct Stepper<P: SetDutyCycle> {
    sequencer: StepSequencer<P>,
    clock: MotionClock,
    config: StepperConfig,
    direction: bool,
    rpm: f32,
}

impl<P: SetDutyCycle> Stepper<P> {
    /// Build a stepper with default duty limits.
    ///
    /// The reference boards use 12 steps per revolution, see
    /// `DEFAULT_STEPS_PER_REVOLUTION`.
    pub fn new<I>(
        pins: I,
        steps_per_revolution: u16,
    ) -> Result<Self, DriveError<P::Error>>
    where
        I: IntoIterator<Item = P>,
    {
        Self::with_config(pins, StepperConfig::with_steps(steps_per_revolution))
    }

    pub fn with_config<I>(
        pins: I,
        config: StepperConfig,
    ) -> Result<Self, DriveError<P::Error>>
    where
        I: IntoIterator<Item = P>,
    {
        config.validate()?;
        let sequencer = StepSequencer::new(pins, config.steps_per_revolution)?;
        tracing::debug!(
            steps_per_revolution = config.steps_per_revolution,
            wires = sequencer.wires(),
            "stepper initialized"
        );
        Ok(Self {
            sequencer,
            clock: MotionClock::new(config.max_backlog_steps),
            config,
            direction: true,
            rpm: 0.0,
        })
    }

    /// Step once in `direction`, immediately.
    ///
    /// `power` scales the coil duty and is clamped to [0, 1]; pacing is left to
    /// the caller.
    pub fn step(
        &mut self,
        direction: bool,
        power: f32,
    ) -> Result<(), P::Error> {
        self.sequencer
            .set_level(self.config.duty.for_power(power));
        self.sequencer.advance(direction)
    }

    /// Set a signed speed for `tick`. The sign picks the direction; zero stops
    /// stepping but keeps the coils energized for holding torque.
    pub fn set_rate(
        &mut self,
        rpm: f32,
    ) {
        let rpm = if rpm.is_finite() {
            rpm
        } else {
            tracing::warn!("non-finite rpm ignored, holding position");
            0.0
        };
        if rpm != 0.0 {
            self.direction = rpm > 0.0;
        }
        self.rpm = rpm;
        self.clock.set_rate(self.steps_per_second(rpm));
        self.sequencer
            .set_level(self.config.duty.for_rpm(rpm, self.config.full_power_rpm));
    }

    /// Step in the stored direction if a step is due. Returns whether a step
    /// was taken.
    pub fn tick(
        &mut self,
        now: Instant,
    ) -> Result<bool, P::Error> {
        if !self.clock.is_due(now) {
            return Ok(false);
        }
        self.sequencer.advance(self.direction)?;
        tracing::trace!(index = self.sequencer.index(), "step");
        Ok(true)
    }

    /// Stop stepping and release the coils. Idempotent.
    pub fn stop(&mut self) -> Result<(), P::Error> {
        self.rpm = 0.0;
        self.clock.halt();
        self.sequencer.deenergize()
    }

    /// `|rpm| * steps_per_revolution / 60`.
    pub fn steps_per_second(
        &self,
        rpm: f32,
    ) -> f64 {
        libm::fabs(rpm as f64) * self.config.steps_per_revolution as f64 / 60.0
    }

    /// Time until the next step is due, `None` when not stepping.
    pub fn until_due(
        &self,
        now: Instant,
    ) -> Option<Duration> {
        self.clock.until_due(now)
    }

    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    /// Current step index within the revolution.
    pub fn position(&self) -> u16 {
        self.sequencer.index()
    }

    pub fn is_energized(&self) -> bool {
        self.sequencer.is_energized()
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &StepSequencer<P> {
        &self.sequencer
    }
}

impl<P: SetDutyCycle> Drop for Stepper<P> {
    fn drop(&mut self) {
        if self.sequencer.is_energized() && self.sequencer.deenergize().is_err() {
            tracing::error!("failed to release stepper coils on drop");
        }
    }
}
