//! Command transport between callers and the drive task loop.
//!
//! - `channel`: latest-value channel holding the per-wheel targets

pub mod channel;
