//! Synchronization primitives for in-process communication.
//!
//! This module provides the blocking handoff queue used between the
//! oscillator's cycle thread and the threads waiting on it.

pub mod queue;

use std::time::Duration;

pub use queue::{BlockingQueue, RecvError, RecvTimeoutError, SendError, TryRecvError};

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}
