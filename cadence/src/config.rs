//! Oscillator configuration: cycle interval bounds, initial phase, RNG seed.
//!
//! Every value is validated when it is constructed, so a [`CycleInterval`]
//! that exists is always usable and the oscillator never has to reject one
//! later.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::phase::Phase;

/// Default lower bound of the cycle interval.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(4);

/// Default upper bound (exclusive) of the cycle interval.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(6);

/// Environment variable overriding the interval lower bound, in seconds.
pub const ENV_MIN_INTERVAL_SECS: &str = "CADENCE_MIN_INTERVAL_SECS";
/// Environment variable overriding the interval upper bound, in seconds.
pub const ENV_MAX_INTERVAL_SECS: &str = "CADENCE_MAX_INTERVAL_SECS";
/// Environment variable overriding the initial phase (`red` / `green`).
pub const ENV_INITIAL_PHASE: &str = "CADENCE_INITIAL_PHASE";
/// Environment variable fixing the RNG seed.
pub const ENV_SEED: &str = "CADENCE_SEED";

/// Error building a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The interval lower bound is zero.
    #[error("cycle interval minimum must be greater than zero")]
    ZeroInterval,
    /// The interval upper bound is below the lower bound.
    #[error("cycle interval maximum ({max:?}) is less than minimum ({min:?})")]
    InvertedInterval { min: Duration, max: Duration },
    /// Seconds value is negative, NaN, infinite or too large.
    #[error("invalid interval seconds: {0}")]
    InvalidSeconds(f64),
    /// A configuration source held a value that could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Range the cycle sleep duration is drawn from, uniformly over `[min, max)`.
///
/// `min == max` is accepted and yields a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInterval {
    min: Duration,
    max: Duration,
}

impl CycleInterval {
    /// Creates an interval.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroInterval`] if `min` is zero.
    /// - [`ConfigError::InvertedInterval`] if `max < min`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if max < min {
            return Err(ConfigError::InvertedInterval { min, max });
        }
        Ok(Self { min, max })
    }

    /// Creates an interval from fractional seconds.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSeconds`] for negative or non-finite input, plus
    /// everything [`CycleInterval::new`] rejects.
    pub fn from_secs_f64(min: f64, max: f64) -> Result<Self, ConfigError> {
        Self::new(secs_to_duration(min)?, secs_to_duration(max)?)
    }

    /// Inclusive lower bound.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    /// Exclusive upper bound (inclusive when equal to `min`).
    #[inline]
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draws one sleep duration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = saturating_nanos(self.min);
        let max = saturating_nanos(self.max);
        Duration::from_nanos(rng.gen_range(min..max))
    }
}

impl Default for CycleInterval {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_INTERVAL,
            max: DEFAULT_MAX_INTERVAL,
        }
    }
}

fn secs_to_duration(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidSeconds(secs))
}

#[inline]
fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Configuration for a [`PhaseOscillator`](crate::runtime::oscillator::PhaseOscillator).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OscillatorConfig {
    /// Phase held before the first cycle.
    pub initial_phase: Phase,
    /// Bounds of the randomized sleep between phase changes.
    pub interval: CycleInterval,
    /// Fixed RNG seed for reproducible intervals. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl OscillatorConfig {
    /// Builds a config from the defaults plus any `CADENCE_*` environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but malformed, or if
    /// the resulting interval is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from the defaults plus overrides resolved by `lookup`.
    ///
    /// `lookup` is called with each `ENV_*` key and returns its value, if set.
    /// Either interval bound may be given alone; the other keeps its default.
    ///
    /// # Errors
    ///
    /// See [`OscillatorConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        let min = lookup(ENV_MIN_INTERVAL_SECS)
            .map(|v| parse_value::<f64>(ENV_MIN_INTERVAL_SECS, v))
            .transpose()?;
        let max = lookup(ENV_MAX_INTERVAL_SECS)
            .map(|v| parse_value::<f64>(ENV_MAX_INTERVAL_SECS, v))
            .transpose()?;
        if min.is_some() || max.is_some() {
            config.interval = CycleInterval::from_secs_f64(
                min.unwrap_or(DEFAULT_MIN_INTERVAL.as_secs_f64()),
                max.unwrap_or(DEFAULT_MAX_INTERVAL.as_secs_f64()),
            )?;
        }

        if let Some(v) = lookup(ENV_INITIAL_PHASE) {
            config.initial_phase = parse_value(ENV_INITIAL_PHASE, v)?;
        }

        if let Some(v) = lookup(ENV_SEED) {
            config.seed = Some(parse_value(ENV_SEED, v)?);
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
