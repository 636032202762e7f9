//! Oscillator cycle thread runtime.
//!
//! Responsibilities:
//! - Flip the phase, publish it to the shared snapshot and push it onto the
//!   queue, once per cycle.
//! - Sleep for an interval drawn from one generator owned for the whole
//!   lifetime of the thread.
//! - Check the stop flag every iteration; the sleep is a `park_timeout` so a
//!   stop request (which unparks this thread) cuts it short.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use minstant::Instant;
use rand::rngs::StdRng;

use crate::config::CycleInterval;
use crate::trace::{debug, trace};

use super::oscillator::Shared;

/// Cycle thread state and event loop.
pub(crate) struct CycleThread {
    shared: Arc<Shared>,
    interval: CycleInterval,
    rng: StdRng,
}

impl CycleThread {
    pub(crate) fn new(shared: Arc<Shared>, interval: CycleInterval, rng: StdRng) -> Self {
        Self {
            shared,
            interval,
            rng,
        }
    }

    /// Runs the cycle loop.
    ///
    /// Returns when a stop is requested or the queue is closed.
    pub(crate) fn run(&mut self) {
        let mut phase = self.shared.current_phase();

        while !self.shared.is_stopped() {
            let started = Instant::now();

            phase = phase.complement();
            self.shared.set_current_phase(phase);

            if self.shared.queue.send(phase).is_err() {
                debug!("phase queue closed, leaving cycle loop");
                return;
            }

            let pause = self.interval.sample(&mut self.rng);
            trace!(
                phase = %phase,
                pause_ms = pause.as_millis() as u64,
                "phase changed"
            );

            if !self.sleep(started.checked_add(pause)) {
                debug!("stop requested during cycle sleep");
                return;
            }

            let cycle = started.elapsed();
            trace!(cycle_us = cycle.as_micros() as u64, "cycle complete");
            self.shared
                .last_cycle_nanos
                .store(u64::try_from(cycle.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);
            self.shared.cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Parks until `deadline`, or until stopped when `deadline` is `None`
    /// (a pause beyond the clock's range).
    ///
    /// Returns `false` if a stop was requested first.
    fn sleep(&self, deadline: Option<Instant>) -> bool {
        loop {
            if self.shared.is_stopped() {
                return false;
            }
            let Some(deadline) = deadline else {
                thread::park();
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            // Spurious and stale unparks just go round the loop again.
            thread::park_timeout(deadline.duration_since(now));
        }
    }
}
