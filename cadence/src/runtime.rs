//! Runtime for the phase oscillator.
//!
//! - `oscillator`: the public handle (`start`, `wait_for_phase`, `shutdown`).
//! - `cycle`: the background loop run on the oscillator's own thread.

mod cycle;
pub mod oscillator;
