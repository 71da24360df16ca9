//! Stepper sequencing, step timing and differential-drive control for no-std
//! microcontrollers.
//!
//! For a host-side runnable drive, see the `stepdrive-app/mock-mcu` binary.
#![no_std]

pub mod utils;
