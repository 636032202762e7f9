//! Unbounded blocking FIFO queue built on a mutex and a condition variable.
//!
//! # Overview
//!
//! - [`BlockingQueue::send`] never blocks: it appends under the lock and wakes
//!   one waiting receiver.
//! - [`BlockingQueue::receive`] parks the caller until a value is available,
//!   then moves the head value out to the caller.
//! - [`BlockingQueue::close`] wakes every waiter. Values already buffered can
//!   still be received; after that, receivers get [`RecvError`].
//!
//! # Delivery semantics
//!
//! Each value is delivered to exactly **one** receiver. With several threads
//! blocked in `receive()`, whichever one acquires the lock first after a send
//! gets the value and the rest keep waiting. This is not a broadcast
//! primitive: if every observer must learn about a value, give each observer
//! its own queue.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use cadence::sync::BlockingQueue;
//!
//! let queue = Arc::new(BlockingQueue::new());
//!
//! let rx = Arc::clone(&queue);
//! let consumer = thread::spawn(move || rx.receive());
//!
//! queue.send(42u64).unwrap();
//! assert_eq!(consumer.join().unwrap(), Ok(42));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::Timeout;

/// Buffered values plus the closed flag, guarded together so the wait
/// predicate is always evaluated against a consistent view.
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> State<T> {
    #[inline]
    fn is_waiting(&self) -> bool {
        self.items.is_empty() && !self.closed
    }
}

/// Thread-safe FIFO queue with blocking receive and non-blocking send.
///
/// Share it behind an `Arc` (or by reference with scoped threads). Any number
/// of threads may send and receive concurrently; see the module docs for the
/// single-delivery rule.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    /// Signalled when the queue becomes non-empty or is closed.
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Locks the state, recovering from poisoning.
    ///
    /// Every critical section leaves `State` consistent before it can panic,
    /// so a poisoned guard is still valid.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `value` to the tail and wakes one waiting receiver.
    ///
    /// Never blocks beyond the brief lock acquisition.
    ///
    /// # Errors
    ///
    /// Returns the value inside [`SendError`] if the queue has been closed.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(SendError(value));
            }
            state.items.push_back(value);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Removes and returns the head value, blocking while the queue is empty.
    ///
    /// The wait re-checks its predicate after every wake, so spurious wakeups
    /// and a send that lands before the wait starts are both handled. Without
    /// a [`close`](Self::close) this blocks for as long as nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError`] once the queue is closed and fully drained.
    pub fn receive(&self) -> Result<T, RecvError> {
        let state = self.lock();
        let mut state = self
            .available
            .wait_while(state, |s| s.is_waiting())
            .unwrap_or_else(PoisonError::into_inner);
        state.items.pop_front().ok_or(RecvError)
    }

    /// Like [`receive`](Self::receive), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// - [`RecvTimeoutError::Timeout`] if nothing arrived in time.
    /// - [`RecvTimeoutError::Closed`] if the queue is closed and drained.
    pub fn receive_timeout(&self, timeout: impl Into<Timeout>) -> Result<T, RecvTimeoutError> {
        let limit = match timeout.into() {
            Timeout::Infinite => return self.receive().map_err(RecvTimeoutError::from),
            Timeout::Duration(d) => d,
        };

        let state = self.lock();
        let (mut state, _) = self
            .available
            .wait_timeout_while(state, limit, |s| s.is_waiting())
            .unwrap_or_else(PoisonError::into_inner);

        // A value that raced the deadline still wins over the timeout.
        match state.items.pop_front() {
            Some(value) => Ok(value),
            None if state.closed => Err(RecvTimeoutError::Closed),
            None => Err(RecvTimeoutError::Timeout),
        }
    }

    /// Removes the head value if one is buffered, without blocking.
    ///
    /// # Errors
    ///
    /// - [`TryRecvError::Empty`] if the queue is open but empty.
    /// - [`TryRecvError::Closed`] if the queue is closed and drained.
    pub fn try_receive(&self) -> Result<T, TryRecvError> {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(value) => Ok(value),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Closes the queue and wakes every blocked receiver.
    ///
    /// Buffered values stay receivable. Further sends fail. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.available.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered values at the time of the call.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if no values are buffered at the time of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error returned when [`BlockingQueue::send`] is called on a closed queue.
///
/// Contains the value that could not be sent.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Returns the value that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SendError").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sending on a closed queue")
    }
}

impl<T> std::error::Error for SendError<T> {}

/// Error returned by [`BlockingQueue::receive`] when the queue is closed and
/// no values remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("receiving on a closed and empty queue")]
pub struct RecvError;

/// Error returned by [`BlockingQueue::receive_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvTimeoutError {
    /// No value arrived before the timeout elapsed.
    #[error("timed out waiting on queue")]
    Timeout,
    /// The queue is closed and no values remain.
    #[error("receiving on a closed and empty queue")]
    Closed,
}

impl From<RecvError> for RecvTimeoutError {
    fn from(_: RecvError) -> Self {
        Self::Closed
    }
}

/// Error returned by [`BlockingQueue::try_receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    /// The queue is open but currently empty.
    #[error("queue empty")]
    Empty,
    /// The queue is closed and no values remain.
    #[error("receiving on a closed and empty queue")]
    Closed,
}
