//! Step timing.
//!
//! `MotionClock` turns a step rate into "is a step due now?" answers without
//! accumulating drift: every due step moves the reference forward by exactly
//! one interval, so a late poll is followed by catch-up steps instead of a
//! slower cadence.

use embassy_time::{Duration, Instant};

use crate::utils::config::DEFAULT_MAX_BACKLOG_STEPS;

/// Source of monotonic time for the drive task loop.
///
/// Shared by reference, so the same clock can feed several components.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<F> Clock for F
where
    F: Fn() -> Instant,
{
    fn now(&self) -> Instant {
        self()
    }
}

/// Clock backed by the embassy time driver of the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Per-motor step timing engine.
#[derive(Debug, Clone)]
pub struct MotionClock {
    /// Inter-step interval in µs, `None` while stopped.
    interval_us: Option<f64>,
    /// Reference point of the last step in µs; `None` until anchored.
    last_step_us: Option<f64>,
    /// Interval changed since the last `is_due`.
    rate_changed: bool,
    max_backlog_steps: u32,
}

impl Default for MotionClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKLOG_STEPS)
    }
}

impl MotionClock {
    /// A stopped clock. Lag beyond `max_backlog_steps` intervals is dropped
    /// rather than replayed.
    pub fn new(max_backlog_steps: u32) -> Self {
        Self {
            interval_us: None,
            last_step_us: None,
            rate_changed: false,
            max_backlog_steps: max_backlog_steps.max(1),
        }
    }

    /// Set the target rate. Zero, negative or non-finite rates stop stepping.
    ///
    /// The reference point is kept, so a new speed applies from the last step.
    /// Time already waited at the old rate counts for at most one step at the
    /// new one.
    pub fn set_rate(
        &mut self,
        steps_per_second: f64,
    ) {
        let interval = if steps_per_second.is_finite() && steps_per_second > 0.0 {
            Some(1_000_000.0 / steps_per_second)
        } else {
            None
        };
        // Starting from a stop is not a change: the anchor followed `now`.
        if self.interval_us.is_some() && interval != self.interval_us {
            self.rate_changed = true;
        }
        self.interval_us = interval;
    }

    /// Current rate in steps per second.
    pub fn rate(&self) -> f64 {
        self.interval_us.map_or(0.0, |i| 1_000_000.0 / i)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_us.map(|i| Duration::from_micros(i as u64))
    }

    /// Stop stepping and drop the reference point; the next `is_due` anchors
    /// afresh.
    pub fn halt(&mut self) {
        self.interval_us = None;
        self.last_step_us = None;
        self.rate_changed = false;
    }

    /// Anchor the reference point on `now`.
    pub fn reset(
        &mut self,
        now: Instant,
    ) {
        self.last_step_us = Some(now.as_micros() as f64);
    }

    /// `true` when at least one interval has passed since the last step; the
    /// reference then advances by exactly one interval.
    pub fn is_due(
        &mut self,
        now: Instant,
    ) -> bool {
        let now_us = now.as_micros() as f64;
        let rate_changed = core::mem::take(&mut self.rate_changed);
        let (Some(interval), Some(mut last)) = (self.interval_us, self.last_step_us) else {
            // Stopped or never anchored: idle time must not become a burst later.
            self.last_step_us = Some(now_us);
            return false;
        };
        let mut elapsed = now_us - last;
        if rate_changed && elapsed > interval {
            // Lag from before the change is not owed at the new rate.
            elapsed = interval;
            last = now_us - interval;
        }
        if elapsed < interval {
            return false;
        }

        let backlog = self.max_backlog_steps as f64 * interval;
        if elapsed - interval > backlog {
            tracing::warn!(
                lag_us = elapsed - interval,
                "step backlog exceeded, dropping missed steps"
            );
            last = now_us - interval - backlog;
        }
        self.last_step_us = Some(last + interval);
        true
    }

    /// Time left until the next step is due, `None` while stopped.
    pub fn until_due(
        &self,
        now: Instant,
    ) -> Option<Duration> {
        let interval = self.interval_us?;
        let Some(last) = self.last_step_us else {
            return Some(Duration::from_micros(interval as u64));
        };
        let left = last + interval - now.as_micros() as f64;
        Some(if left <= 0.0 {
            Duration::from_ticks(0)
        } else {
            // Rounded up so a sleep of this length never wakes before the step.
            Duration::from_micros(libm::ceil(left) as u64)
        })
    }
}
