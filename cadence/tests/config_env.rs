//! Environment-driven configuration.
//!
//! These tests mutate process environment variables, so they are serialized.

use std::time::Duration;

use serial_test::serial;

use cadence::config::{
    ENV_INITIAL_PHASE, ENV_MAX_INTERVAL_SECS, ENV_MIN_INTERVAL_SECS, ENV_SEED,
};
use cadence::{ConfigError, OscillatorConfig, OscillatorError, Phase, PhaseOscillator};

const ALL_KEYS: [&str; 4] = [
    ENV_MIN_INTERVAL_SECS,
    ENV_MAX_INTERVAL_SECS,
    ENV_INITIAL_PHASE,
    ENV_SEED,
];

fn clear_env() {
    for key in ALL_KEYS {
        // SAFETY: tests touching the environment are `#[serial]`.
        unsafe { std::env::remove_var(key) };
    }
}

fn set_env(key: &str, value: &str) {
    // SAFETY: tests touching the environment are `#[serial]`.
    unsafe { std::env::set_var(key, value) };
}

#[test]
#[serial]
fn from_env_without_variables_uses_defaults() {
    clear_env();

    let config = OscillatorConfig::from_env().expect("defaults");
    assert_eq!(config, OscillatorConfig::default());
    assert_eq!(config.interval.min(), Duration::from_secs(4));
    assert_eq!(config.interval.max(), Duration::from_secs(6));
}

#[test]
#[serial]
fn from_env_applies_overrides() {
    clear_env();
    set_env(ENV_MIN_INTERVAL_SECS, "0.25");
    set_env(ENV_MAX_INTERVAL_SECS, "0.75");
    set_env(ENV_INITIAL_PHASE, "Green");
    set_env(ENV_SEED, "1234");

    let osc = PhaseOscillator::from_env().expect("valid overrides");
    clear_env();

    let config = osc.config();
    assert_eq!(config.interval.min(), Duration::from_millis(250));
    assert_eq!(config.interval.max(), Duration::from_millis(750));
    assert_eq!(config.initial_phase, Phase::Green);
    assert_eq!(config.seed, Some(1234));
    assert_eq!(osc.current_phase(), Phase::Green);
}

#[test]
#[serial]
fn from_env_rejects_inverted_interval() {
    clear_env();
    set_env(ENV_MIN_INTERVAL_SECS, "6");
    set_env(ENV_MAX_INTERVAL_SECS, "4");

    let err = PhaseOscillator::from_env().unwrap_err();
    clear_env();

    assert!(matches!(
        err,
        OscillatorError::Config(ConfigError::InvertedInterval { .. })
    ));
}

#[test]
#[serial]
fn from_env_rejects_zero_interval() {
    clear_env();
    set_env(ENV_MIN_INTERVAL_SECS, "0");

    let err = OscillatorConfig::from_env().unwrap_err();
    clear_env();

    assert_eq!(err, ConfigError::ZeroInterval);
}
