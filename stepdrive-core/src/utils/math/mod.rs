//! Math utilities for the stepper drive.
//!
//! This module provides kinematics calculations for two-wheel differential drives.

pub mod kinematics;
