//! Blocking handoff queue and a background phase oscillator.
//!
//! - [`sync::BlockingQueue`]: unbounded FIFO with blocking receive,
//!   non-blocking send and close-on-shutdown.
//! - [`runtime::oscillator::PhaseOscillator`]: flips a two-valued [`Phase`]
//!   on its own thread at randomized intervals and pushes each new value
//!   onto a `BlockingQueue`, so callers can block until a given phase comes
//!   round.
//!
//! Enable the `tracing` feature for structured logs and call
//! [`init_tracing`] to install a subscriber.

pub mod config;
pub mod phase;
pub mod runtime;
pub mod sync;
pub mod trace;

pub use config::{ConfigError, CycleInterval, OscillatorConfig};
pub use phase::Phase;
pub use runtime::oscillator::{OscillatorError, PhaseOscillator, StopHandle};
pub use sync::{BlockingQueue, Timeout};
pub use trace::init_tracing;
