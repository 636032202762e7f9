//! Logging for the oscillator runtime.
//!
//! With the `tracing` feature the crate logs through `tracing`: lifecycle
//! events at `info`/`debug`, every phase change at `trace`. Without it the
//! same macro names expand to nothing.

/// Filter used when `RUST_LOG` is unset or unparsable.
#[cfg(feature = "tracing")]
const DEFAULT_DIRECTIVE: &str = "cadence=trace";

/// Installs a global `fmt` subscriber for cadence's logs.
///
/// Each line carries the uptime and the emitting thread, so the cycle thread
/// (`cadence-cycle`) can be told apart from waiters. Filtering follows
/// `RUST_LOG`, defaulting to `cadence=trace`.
///
/// Only the first call in a process installs anything; later calls, or a
/// subscriber installed by the host, leave the existing one in place.
/// Does nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*};

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(env_filter())
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
fn env_filter() -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace, warn};

// Arguments are discarded unevaluated.
#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {discard as debug, discard as info, discard as trace, discard as warn};
