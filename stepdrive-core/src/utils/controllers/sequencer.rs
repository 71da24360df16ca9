//! Coil sequencing for bipolar stepper motors.
//!
//! A `StepSequencer` owns the coil pins of one motor and walks a sine
//! microstepping table, one index per step. Index `i` of `N` sits at the
//! electrical angle `2π (i + 1/2) / N`; each coil is driven with the positive
//! half of a sine shifted by its phase (A+, B+, A-, B-). With `N = 4` that is
//! the classic two-phase-on full step sequence.
//!
//! # Example
//! ```rust
//! use stepdrive_core::utils::controllers::sequencer::coil_pattern;
//! let first = coil_pattern(0, 4, 4);
//! assert!(first[0] > 0.7 && first[1] > 0.7);
//! assert_eq!((first[2], first[3]), (0.0, 0.0));
//! ```

use core::f32::consts::PI;

use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;

use crate::utils::{
    config::check_steps_per_revolution,
    error::{ConfigError, DriveError},
};

/// Coil pins per motor for a 4-wire hookup.
pub const MAX_COIL_PINS: usize = 4;

/// Electrical phase offset of each coil pin (A+, B+, A-, B-).
const COIL_PHASES: [f32; MAX_COIL_PINS] = [0.0, PI / 2.0, PI, 3.0 * PI / 2.0];

/// Relative coil levels in [0, 1], one per pin. Unused entries stay 0.
pub type CoilPattern = [f32; MAX_COIL_PINS];

/// Coil levels for step `index` of a `steps_per_revolution` cycle.
///
/// Four wires get sine microstepping. Two wires (inverters on the board drive
/// the opposite coil ends) can only switch, so a pin is on while its phase is
/// positive; consecutive indices then share a pattern in order.
pub fn coil_pattern(
    index: u16,
    steps_per_revolution: u16,
    wires: usize,
) -> CoilPattern {
    let t = 2.0 * PI * (index as f32 + 0.5) / steps_per_revolution as f32;
    let mut levels = [0.0; MAX_COIL_PINS];
    for (coil, level) in levels.iter_mut().take(wires).enumerate() {
        let y = libm::sinf(t + COIL_PHASES[coil]);
        *level = if wires == 2 {
            if y > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            y.max(0.0)
        };
    }
    levels
}

/// Per-motor microstepping state machine.
pub struct StepSequencer<P: SetDutyCycle> {
    pins: Vec<P, MAX_COIL_PINS>,
    steps_per_revolution: u16,
    index: u16,
    level: f32,
    energized: bool,
}

impl<P: SetDutyCycle> StepSequencer<P> {
    /// Take ownership of the coil pins and release them.
    ///
    /// Fails with `ConfigError::PinCount` unless exactly 2 or 4 pins are given
    /// and with `ConfigError::StepsPerRevolution` for counts without a table.
    pub fn new<I>(
        pins: I,
        steps_per_revolution: u16,
    ) -> Result<Self, DriveError<P::Error>>
    where
        I: IntoIterator<Item = P>,
    {
        let mut coils = Vec::new();
        let mut count = 0;
        for pin in pins {
            count += 1;
            // Extra pins are dropped; the count below rejects the set anyway.
            let _ = coils.push(pin);
        }
        if count != 2 && count != 4 {
            return Err(ConfigError::PinCount(count).into());
        }
        check_steps_per_revolution(steps_per_revolution)?;

        let mut sequencer = StepSequencer {
            pins: coils,
            steps_per_revolution,
            index: 0,
            level: 1.0,
            energized: true,
        };
        sequencer.deenergize().map_err(DriveError::Pin)?;
        Ok(sequencer)
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn steps_per_revolution(&self) -> u16 {
        self.steps_per_revolution
    }

    /// Number of coil pins (2 or 4).
    pub fn wires(&self) -> usize {
        self.pins.len()
    }

    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn pins(&self) -> &[P] {
        &self.pins
    }

    /// Scale applied to the coil pattern on the next write, clamped to [0, 1].
    pub fn set_level(
        &mut self,
        level: f32,
    ) {
        self.level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
    }

    /// Pattern for the current index.
    pub fn pattern(&self) -> CoilPattern {
        coil_pattern(self.index, self.steps_per_revolution, self.pins.len())
    }

    /// Move one index forward (`true`) or backward, wrapping modulo
    /// `steps_per_revolution`, and write the new pattern.
    pub fn advance(
        &mut self,
        direction: bool,
    ) -> Result<(), P::Error> {
        let n = self.steps_per_revolution;
        self.index = if direction {
            (self.index + 1) % n
        } else {
            (self.index + n - 1) % n
        };
        self.apply()
    }

    /// Write the pattern of the current index without moving.
    pub fn hold(&mut self) -> Result<(), P::Error> {
        self.apply()
    }

    /// Drive every coil pin inactive. The index is kept so the next `advance`
    /// resumes from the same electrical phase.
    pub fn deenergize(&mut self) -> Result<(), P::Error> {
        for pin in self.pins.iter_mut() {
            pin.set_duty_cycle_fully_off()?;
        }
        self.energized = false;
        Ok(())
    }

    fn apply(&mut self) -> Result<(), P::Error> {
        let pattern = self.pattern();
        let mut any_on = false;
        for (pin, coil) in self.pins.iter_mut().zip(pattern) {
            let duty = (pin.max_duty_cycle() as f32 * coil * self.level) as u16;
            pin.set_duty_cycle(duty)?;
            any_on |= duty != 0;
        }
        // With two wires the inverters power the opposite coil ends, so an
        // all-low pattern still holds the rotor.
        self.energized = any_on || (self.pins.len() == 2 && self.level > 0.0);
        Ok(())
    }
}
