//! Background phase oscillator.
//!
//! A [`PhaseOscillator`] owns a [`BlockingQueue<Phase>`] and, once started, a
//! dedicated cycle thread that flips the phase at randomized intervals and
//! pushes every new value onto the queue. Consumers block in
//! [`PhaseOscillator::wait_for_phase`] until the phase they want comes round.
//!
//! # Lifecycle
//!
//! ```text
//! new(config) ──> start() ──> [cycle thread] ──> shutdown() / drop
//!                    │                               │
//!                    └─ returns immediately          ├─ stop flag set, thread unparked
//!                                                    ├─ queue closed (waiters get RecvError)
//!                                                    └─ thread joined (shutdown only)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cadence::{OscillatorConfig, Phase, PhaseOscillator};
//!
//! let mut light = PhaseOscillator::new(OscillatorConfig::default());
//! light.start()?;
//!
//! // Blocks until the oscillator next switches to green.
//! light.wait_for_phase(Phase::Green)?;
//!
//! light.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Consumers
//!
//! Phases are delivered through a single-delivery queue: with several
//! threads waiting, each pushed phase reaches only one of them. A waiter that
//! loses a `Green` to another waiter keeps waiting for the next one. If every
//! waiter must observe every change, this is the wrong primitive.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use minstant::Instant;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{ConfigError, OscillatorConfig};
use crate::phase::Phase;
use crate::sync::{BlockingQueue, RecvError, RecvTimeoutError, Timeout};
use crate::trace::{debug, info, warn};

use super::cycle::CycleThread;

/// Name given to the cycle thread.
pub const CYCLE_THREAD_NAME: &str = "cadence-cycle";

/// Error operating a [`PhaseOscillator`].
#[derive(Debug, thiserror::Error)]
pub enum OscillatorError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// [`PhaseOscillator::start`] was already called.
    #[error("oscillator already started")]
    AlreadyStarted,
    /// A stop was requested before the oscillator was started.
    #[error("oscillator stopped")]
    Stopped,
    /// The OS refused to spawn the cycle thread.
    #[error("failed to spawn cycle thread: {0}")]
    Spawn(io::Error),
}

/// State shared between the oscillator handle, its stop handles and the
/// cycle thread.
pub(crate) struct Shared {
    pub(crate) queue: BlockingQueue<Phase>,
    /// Best-effort snapshot, written only by the cycle thread.
    current: Mutex<Phase>,
    stop: AtomicBool,
    /// Cycle thread, registered by `start` so a stop can unpark it.
    cycle_thread: Mutex<Option<Thread>>,
    pub(crate) cycles: AtomicU64,
    pub(crate) last_cycle_nanos: AtomicU64,
}

impl Shared {
    fn new(initial: Phase) -> Self {
        Self {
            queue: BlockingQueue::new(),
            current: Mutex::new(initial),
            stop: AtomicBool::new(false),
            cycle_thread: Mutex::new(None),
            cycles: AtomicU64::new(0),
            last_cycle_nanos: AtomicU64::new(0),
        }
    }

    pub(crate) fn current_phase(&self) -> Phase {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_current_phase(&self, phase: Phase) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sets the stop flag, wakes the cycle thread and closes the queue.
    ///
    /// Returns `true` for the first request only.
    fn request_stop(&self) -> bool {
        let first = !self.stop.swap(true, Ordering::SeqCst);
        if let Some(thread) = self
            .cycle_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            thread.unpark();
        }
        self.queue.close();
        first
    }

    fn register_cycle_thread(&self, thread: Thread) {
        *self
            .cycle_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread.clone());

        // A stop that raced registration found no thread to unpark.
        if self.is_stopped() {
            thread.unpark();
        }
    }
}

/// Cloneable handle that stops an oscillator from any thread.
///
/// Stopping closes the phase queue, so every blocked
/// [`wait_for_phase`](PhaseOscillator::wait_for_phase) returns
/// [`RecvError`]. The cycle thread is not joined; use
/// [`PhaseOscillator::shutdown`] for that.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Requests a stop. Idempotent.
    pub fn stop(&self) {
        if self.shared.request_stop() {
            info!("oscillator stop requested via handle");
        }
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Two-phase state machine driven by a background thread.
///
/// Dropping the oscillator requests a stop (and so wakes blocked waiters) but
/// does not wait for the cycle thread. Use [`PhaseOscillator::shutdown`] to
/// stop and join.
pub struct PhaseOscillator {
    shared: Arc<Shared>,
    config: OscillatorConfig,
    /// Loop state, built once with its generator and taken by `start`.
    cycle: Option<CycleThread>,
    handle: Option<JoinHandle<()>>,
}

impl PhaseOscillator {
    /// Creates a stopped oscillator holding `config.initial_phase`.
    ///
    /// The random generator for cycle intervals is created here, once, from
    /// `config.seed` or OS entropy.
    #[must_use]
    pub fn new(config: OscillatorConfig) -> Self {
        let shared = Arc::new(Shared::new(config.initial_phase));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let cycle = CycleThread::new(Arc::clone(&shared), config.interval, rng);

        Self {
            shared,
            config,
            cycle: Some(cycle),
            handle: None,
        }
    }

    /// Creates an oscillator from [`OscillatorConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`OscillatorError::Config`] if an override is malformed.
    pub fn from_env() -> Result<Self, OscillatorError> {
        Ok(Self::new(OscillatorConfig::from_env()?))
    }

    /// Spawns the cycle thread and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`OscillatorError::AlreadyStarted`] on a second call.
    /// - [`OscillatorError::Stopped`] if a stop was already requested.
    /// - [`OscillatorError::Spawn`] if the thread cannot be created.
    pub fn start(&mut self) -> Result<(), OscillatorError> {
        if self.shared.is_stopped() {
            return Err(OscillatorError::Stopped);
        }
        let mut cycle = self.cycle.take().ok_or(OscillatorError::AlreadyStarted)?;

        info!(
            initial_phase = %self.config.initial_phase,
            min_interval_ms = self.config.interval.min().as_millis() as u64,
            max_interval_ms = self.config.interval.max().as_millis() as u64,
            seeded = self.config.seed.is_some(),
            "oscillator starting"
        );

        debug!("spawning cycle thread");
        let handle = thread::Builder::new()
            .name(CYCLE_THREAD_NAME.into())
            .spawn(move || {
                info!("cycle thread started");
                cycle.run();
                info!("cycle thread exiting");
            })
            .map_err(|e| {
                warn!(error = %e, "failed to spawn cycle thread");
                OscillatorError::Spawn(e)
            })?;

        self.shared.register_cycle_thread(handle.thread().clone());
        self.handle = Some(handle);
        Ok(())
    }

    /// Blocks until a received phase equals `target`.
    ///
    /// Every phase received on the way is consumed and discarded. That is
    /// only sound because the domain has two values that strictly alternate:
    /// a skipped value is always the complement of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError`] if the oscillator stops before `target` arrives.
    pub fn wait_for_phase(&self, target: Phase) -> Result<(), RecvError> {
        loop {
            if self.shared.queue.receive()? == target {
                return Ok(());
            }
        }
    }

    /// Like [`wait_for_phase`](Self::wait_for_phase), bounded by an overall
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// - [`RecvTimeoutError::Timeout`] if `target` did not arrive in time.
    /// - [`RecvTimeoutError::Closed`] if the oscillator stopped first.
    pub fn wait_for_phase_timeout(
        &self,
        target: Phase,
        timeout: impl Into<Timeout>,
    ) -> Result<(), RecvTimeoutError> {
        // A deadline past the clock's range is no deadline at all.
        let deadline = match timeout.into() {
            Timeout::Duration(d) => Instant::now().checked_add(d),
            Timeout::Infinite => None,
        };
        let Some(deadline) = deadline else {
            return Ok(self.wait_for_phase(target)?);
        };

        loop {
            let now = Instant::now();
            let remaining = if now >= deadline {
                Duration::ZERO
            } else {
                deadline.duration_since(now)
            };
            if self.shared.queue.receive_timeout(remaining)? == target {
                return Ok(());
            }
        }
    }

    /// Best-effort snapshot of the current phase.
    ///
    /// Not synchronized with queue delivery: it may already show a phase
    /// that a waiter has not received yet.
    #[must_use]
    pub fn current_phase(&self) -> Phase {
        self.shared.current_phase()
    }

    /// The phase queue fed by the cycle thread.
    #[must_use]
    pub fn queue(&self) -> &BlockingQueue<Phase> {
        &self.shared.queue
    }

    /// The configuration this oscillator was built with.
    #[must_use]
    pub fn config(&self) -> &OscillatorConfig {
        &self.config
    }

    /// Number of completed cycles (phase change plus full sleep).
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }

    /// Measured duration of the most recent completed cycle.
    #[must_use]
    pub fn last_cycle(&self) -> Option<Duration> {
        match self.shared.last_cycle_nanos.load(Ordering::Relaxed) {
            0 => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    /// Returns `true` while the cycle thread is live and no stop is pending.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shared.is_stopped() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns a handle that can stop this oscillator from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stops the cycle thread, wakes every waiter and joins the thread.
    ///
    /// 1. Sets the stop flag and unparks the cycle thread
    /// 2. Closes the queue (blocked waiters return [`RecvError`])
    /// 3. Waits for the cycle thread to exit
    pub fn shutdown(mut self) {
        info!("oscillator shutdown initiated");

        self.shared.request_stop();

        if let Some(handle) = self.handle.take() {
            debug!("waiting for cycle thread to exit");
            if handle.join().is_err() {
                warn!("cycle thread panicked");
            }
        }

        info!(cycles = self.cycles(), "oscillator shutdown complete");
    }
}

impl std::fmt::Debug for PhaseOscillator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseOscillator")
            .field("current_phase", &self.current_phase())
            .field("running", &self.is_running())
            .field("cycles", &self.cycles())
            .field("queue", &self.shared.queue)
            .finish_non_exhaustive()
    }
}

impl Drop for PhaseOscillator {
    fn drop(&mut self) {
        // Signal only; the thread exits on its own once unparked.
        self.shared.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::CycleInterval;

    fn fast_config(min_ms: u64, max_ms: u64) -> OscillatorConfig {
        OscillatorConfig {
            initial_phase: Phase::Red,
            interval: CycleInterval::new(
                Duration::from_millis(min_ms),
                Duration::from_millis(max_ms),
            )
            .unwrap(),
            seed: Some(0x5EED),
        }
    }

    #[test]
    fn test_initial_phase_before_start() {
        let config = OscillatorConfig {
            initial_phase: Phase::Green,
            ..OscillatorConfig::default()
        };
        let osc = PhaseOscillator::new(config);

        assert_eq!(osc.current_phase(), Phase::Green);
        assert!(!osc.is_running());
        assert_eq!(osc.cycles(), 0);
        assert_eq!(osc.last_cycle(), None);
        assert!(osc.queue().is_empty());
    }

    #[test]
    fn test_wait_for_phase_skips_non_matching() {
        let osc = PhaseOscillator::new(OscillatorConfig::default());

        osc.queue().send(Phase::Red).unwrap();
        osc.queue().send(Phase::Red).unwrap();
        osc.queue().send(Phase::Green).unwrap();

        assert_eq!(osc.wait_for_phase(Phase::Green), Ok(()));
        assert!(osc.queue().is_empty());
    }

    #[test]
    fn test_wait_for_phase_stops_at_first_match() {
        let osc = PhaseOscillator::new(OscillatorConfig::default());

        osc.queue().send(Phase::Green).unwrap();
        osc.queue().send(Phase::Red).unwrap();

        assert_eq!(osc.wait_for_phase(Phase::Green), Ok(()));
        assert_eq!(osc.queue().len(), 1);
    }

    #[test]
    fn test_wait_for_phase_timeout_with_unbounded_duration() {
        let osc = PhaseOscillator::new(OscillatorConfig::default());
        osc.queue().send(Phase::Red).unwrap();
        osc.queue().send(Phase::Green).unwrap();

        assert_eq!(
            osc.wait_for_phase_timeout(Phase::Green, Duration::MAX),
            Ok(())
        );
        assert!(osc.queue().is_empty());
    }

    #[test]
    fn test_wait_for_phase_timeout_without_producer() {
        let osc = PhaseOscillator::new(OscillatorConfig::default());
        osc.queue().send(Phase::Red).unwrap();

        assert_eq!(
            osc.wait_for_phase_timeout(Phase::Green, Duration::from_millis(30)),
            Err(RecvTimeoutError::Timeout)
        );
        assert!(osc.queue().is_empty());
    }

    #[test]
    fn test_start_returns_immediately() {
        // Default interval: the first sleep is at least four seconds.
        let mut osc = PhaseOscillator::new(OscillatorConfig::default());

        let begin = std::time::Instant::now();
        osc.start().unwrap();
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(osc.is_running());

        osc.shutdown();
    }

    #[test]
    fn test_start_twice_fails() {
        let mut osc = PhaseOscillator::new(fast_config(10, 20));
        osc.start().unwrap();

        assert!(matches!(osc.start(), Err(OscillatorError::AlreadyStarted)));

        osc.shutdown();
    }

    #[test]
    fn test_start_after_stop_fails() {
        let mut osc = PhaseOscillator::new(fast_config(10, 20));
        osc.stop_handle().stop();

        assert!(matches!(osc.start(), Err(OscillatorError::Stopped)));
        assert!(osc.queue().is_closed());
    }

    #[test]
    fn test_first_pushed_phase_is_complement_of_initial() {
        let mut osc = PhaseOscillator::new(fast_config(10, 20));
        osc.start().unwrap();

        assert_eq!(
            osc.queue().receive_timeout(Duration::from_secs(5)),
            Ok(Phase::Green)
        );

        osc.shutdown();
    }

    #[test]
    fn test_shutdown_interrupts_long_sleep() {
        let config = OscillatorConfig {
            interval: CycleInterval::new(Duration::from_secs(60), Duration::from_secs(61)).unwrap(),
            ..OscillatorConfig::default()
        };
        let mut osc = PhaseOscillator::new(config);
        osc.start().unwrap();

        // Wait for the first push so the thread is inside its sleep.
        assert_eq!(
            osc.queue().receive_timeout(Duration::from_secs(5)),
            Ok(Phase::Green)
        );

        let begin = std::time::Instant::now();
        osc.shutdown();
        assert!(begin.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_pause_beyond_clock_range_still_stops() {
        let config = OscillatorConfig {
            interval: CycleInterval::new(Duration::MAX, Duration::MAX).unwrap(),
            ..OscillatorConfig::default()
        };
        let mut osc = PhaseOscillator::new(config);
        osc.start().unwrap();

        assert_eq!(
            osc.queue().receive_timeout(Duration::from_secs(5)),
            Ok(Phase::Green)
        );

        let begin = std::time::Instant::now();
        osc.shutdown();
        assert!(begin.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cycles_are_counted_and_measured() {
        let mut osc = PhaseOscillator::new(fast_config(5, 10));
        osc.start().unwrap();

        for _ in 0..4 {
            osc.queue().receive_timeout(Duration::from_secs(5)).unwrap();
        }

        assert!(osc.cycles() >= 3, "cycles = {}", osc.cycles());
        let last = osc.last_cycle().unwrap();
        assert!(last >= Duration::from_millis(5), "last cycle {last:?}");

        osc.shutdown();
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OscillatorError::AlreadyStarted.to_string(),
            "oscillator already started"
        );
        assert_eq!(
            OscillatorError::from(ConfigError::ZeroInterval).to_string(),
            "configuration error: cycle interval minimum must be greater than zero"
        );
    }
}
