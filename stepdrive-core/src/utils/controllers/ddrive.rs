//! Two-wheel differential drive built on two `Stepper`s.
//!
//! Setters (`set_rpm`, `set_trans_rot`, `stop`) may be called from any
//! execution context while `task_loop` runs on its own thread or core. The
//! setters only publish into the `CommandChannel`; the loop copies the latest
//! targets out and steps both wheels. Motor state sits behind a critical
//! section so `stop` can release the coils right away without racing a step
//! that is in flight.

use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Instant};
use embedded_hal::{delay::DelayNs, pwm::SetDutyCycle};

use crate::utils::{
    config::DriveConfig,
    connection::channel::{CommandChannel, DriveTargets},
    controllers::{clock::Clock, stepper::Stepper, DriveCommand},
    error::DriveError,
    math::kinematics::{DriveKinematics, WheelRpms},
};

/// Lifecycle of a `DiffDrive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    /// Constructed, no task loop yet.
    Idle,
    /// A task loop is stepping the wheels.
    Running,
    /// Coils released by `stop`, until the next speed command.
    Stopped,
}

struct Wheels<P: SetDutyCycle> {
    left: Stepper<P>,
    right: Stepper<P>,
    /// Sequence number of the last targets handed to the steppers.
    applied: u32,
    running: bool,
}

impl<P: SetDutyCycle> Wheels<P> {
    fn apply(
        &mut self,
        targets: &DriveTargets,
    ) -> Result<(), P::Error> {
        self.applied = targets.sequence;
        if targets.stopped {
            return self.stop();
        }
        self.left.set_rate(targets.left.rpm());
        self.right.set_rate(targets.right.rpm());
        Ok(())
    }

    /// Release both motors even if the first one fails.
    fn stop(&mut self) -> Result<(), P::Error> {
        let left = self.left.stop();
        let right = self.right.stop();
        left.and(right)
    }
}

/// Differential drive controller.
pub struct DiffDrive<P: SetDutyCycle> {
    wheels: Mutex<CriticalSectionRawMutex, RefCell<Wheels<P>>>,
    channel: CommandChannel,
    kinematics: DriveKinematics,
    poll_period: Duration,
    shutdown: AtomicBool,
}

impl<P: SetDutyCycle> DiffDrive<P> {
    /// Build a drive with default limits and `steps_per_revolution` patterns
    /// per wheel revolution.
    pub fn new<R, L>(
        right_pins: R,
        left_pins: L,
        steps_per_revolution: u16,
    ) -> Result<Self, DriveError<P::Error>>
    where
        R: IntoIterator<Item = P>,
        L: IntoIterator<Item = P>,
    {
        Self::with_config(
            right_pins,
            left_pins,
            DriveConfig::with_steps(steps_per_revolution),
        )
    }

    pub fn with_config<R, L>(
        right_pins: R,
        left_pins: L,
        config: DriveConfig,
    ) -> Result<Self, DriveError<P::Error>>
    where
        R: IntoIterator<Item = P>,
        L: IntoIterator<Item = P>,
    {
        config.validate()?;
        let right = Stepper::with_config(right_pins, config.stepper)?;
        let left = Stepper::with_config(left_pins, config.stepper)?;
        tracing::info!(
            steps_per_revolution = config.stepper.steps_per_revolution,
            max_rpm = config.max_rpm,
            "differential drive initialized"
        );
        Ok(Self {
            wheels: Mutex::new(RefCell::new(Wheels {
                left,
                right,
                applied: 0,
                running: false,
            })),
            channel: CommandChannel::new(),
            kinematics: DriveKinematics::new(config.track_width_factor, config.max_rpm),
            poll_period: Duration::from_micros(config.poll_period_us as u64),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Command both wheel speeds directly. Speeds beyond `max_rpm` are scaled
    /// down together.
    pub fn set_rpm(
        &self,
        left: f32,
        right: f32,
    ) {
        let wheels = self.kinematics.saturate(WheelRpms::new(left, right));
        let sequence = self.channel.publish_rpm(wheels);
        tracing::debug!(left = wheels.left, right = wheels.right, sequence, "rpm command");
    }

    /// Command translation and rotation; see `DriveKinematics` for the sign
    /// convention.
    pub fn set_trans_rot(
        &self,
        translation: f32,
        rotation: f32,
    ) {
        let wheels = self.kinematics.wheel_rpms(translation, rotation);
        let sequence = self.channel.publish_rpm(wheels);
        tracing::debug!(
            translation,
            rotation,
            left = wheels.left,
            right = wheels.right,
            sequence,
            "trans/rot command"
        );
    }

    /// Dispatch a decoded `DriveCommand`.
    pub fn execute_command(
        &self,
        command: DriveCommand,
    ) -> Result<(), DriveError<P::Error>> {
        match command {
            DriveCommand::Rpm { left, right } => self.set_rpm(left, right),
            DriveCommand::TransRot { trans, rot } => self.set_trans_rot(trans, rot),
            DriveCommand::Stop => self.stop()?,
        }
        Ok(())
    }

    /// Stop both wheels and release their coils, whatever the loop is doing.
    pub fn stop(&self) -> Result<(), DriveError<P::Error>> {
        self.wheels
            .lock(|wheels| {
                let mut wheels = wheels.borrow_mut();
                // Published under the motor lock: a loop iteration either
                // finished before this or will see the stop.
                wheels.applied = self.channel.publish_stop();
                wheels.stop()
            })
            .map_err(DriveError::Pin)?;
        tracing::info!("differential drive stopped, coils released");
        Ok(())
    }

    /// One loop iteration: apply the latest targets and step whichever wheel
    /// is due. Returns how long the caller may sleep before the next one.
    pub fn task(
        &self,
        now: Instant,
    ) -> Result<Duration, DriveError<P::Error>> {
        self.wheels
            .lock(|wheels| {
                let mut wheels = wheels.borrow_mut();
                let targets = self.channel.latest();
                if targets.sequence != wheels.applied {
                    wheels.apply(&targets)?;
                }
                if targets.stopped {
                    return Ok(self.poll_period);
                }

                wheels.left.tick(now)?;
                wheels.right.tick(now)?;

                let next = [wheels.left.until_due(now), wheels.right.until_due(now)]
                    .into_iter()
                    .flatten()
                    .min()
                    .unwrap_or(self.poll_period);
                Ok(next.min(self.poll_period))
            })
            .map_err(DriveError::Pin)
    }

    /// Drive both wheels until `shutdown` is requested.
    ///
    /// Meant for a dedicated thread or core. Sleeps through `delay` between
    /// iterations. On exit, normal or not, both wheels are stopped and their
    /// coils released.
    pub fn task_loop<C, D>(
        &self,
        clock: &C,
        delay: &mut D,
    ) -> Result<(), DriveError<P::Error>>
    where
        C: Clock,
        D: DelayNs,
    {
        let started = self.wheels.lock(|wheels| {
            let mut wheels = wheels.borrow_mut();
            !core::mem::replace(&mut wheels.running, true)
        });
        if !started {
            tracing::warn!("task loop already running");
            return Err(DriveError::AlreadyRunning);
        }
        tracing::info!("drive task loop started");

        let result = self.run(clock, delay);
        if let Err(err) = &result {
            tracing::error!(?err, "drive task loop failed");
        }

        let released = self
            .wheels
            .lock(|wheels| {
                let mut wheels = wheels.borrow_mut();
                wheels.running = false;
                wheels.applied = self.channel.publish_stop();
                wheels.stop()
            })
            .map_err(DriveError::Pin);
        self.shutdown.store(false, Ordering::Release);
        tracing::info!("drive task loop exited, coils released");

        result.and(released)
    }

    /// Ask a running `task_loop` to return. Takes effect at the next
    /// iteration; a request made before the loop starts ends it immediately.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn state(&self) -> DriveState {
        if self.channel.latest().stopped {
            DriveState::Stopped
        } else if self.wheels.lock(|wheels| wheels.borrow().running) {
            DriveState::Running
        } else {
            DriveState::Idle
        }
    }

    /// Latest published targets.
    pub fn targets(&self) -> DriveTargets {
        self.channel.latest()
    }

    /// Step index of `(left, right)`.
    pub fn positions(&self) -> (u16, u16) {
        self.wheels.lock(|wheels| {
            let wheels = wheels.borrow();
            (wheels.left.position(), wheels.right.position())
        })
    }

    /// Whether the coils of `(left, right)` are energized.
    pub fn energized(&self) -> (bool, bool) {
        self.wheels.lock(|wheels| {
            let wheels = wheels.borrow();
            (wheels.left.is_energized(), wheels.right.is_energized())
        })
    }

    pub fn kinematics(&self) -> &DriveKinematics {
        &self.kinematics
    }

    fn run<C, D>(
        &self,
        clock: &C,
        delay: &mut D,
    ) -> Result<(), DriveError<P::Error>>
    where
        C: Clock,
        D: DelayNs,
    {
        while !self.shutdown.load(Ordering::Acquire) {
            let wait = self.task(clock.now())?.as_micros();
            if wait > 0 {
                delay.delay_us(wait.min(u32::MAX as u64) as u32);
            }
        }
        Ok(())
    }
}
