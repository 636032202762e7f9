//! The two-valued phase broadcast by the oscillator.

use std::fmt;
use std::str::FromStr;

/// A discrete oscillator state.
///
/// The domain is closed and has exactly two values. The oscillator and
/// [`wait_for_phase`](crate::runtime::oscillator::PhaseOscillator::wait_for_phase)
/// rely on consecutive phases strictly alternating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Red,
    Green,
}

impl Phase {
    /// Returns the other phase.
    #[inline]
    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Red,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`Phase`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase {0:?} (expected \"red\" or \"green\")")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("red") {
            Ok(Self::Red)
        } else if s.eq_ignore_ascii_case("green") {
            Ok(Self::Green)
        } else {
            Err(ParsePhaseError(s.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement_alternates() {
        assert_eq!(Phase::Red.complement(), Phase::Green);
        assert_eq!(Phase::Green.complement(), Phase::Red);
        assert_eq!(Phase::Red.complement().complement(), Phase::Red);
    }

    #[test]
    fn test_default_is_red() {
        assert_eq!(Phase::default(), Phase::Red);
    }

    #[test]
    fn test_parse() {
        assert_eq!("red".parse(), Ok(Phase::Red));
        assert_eq!(" GREEN ".parse(), Ok(Phase::Green));
        assert_eq!(
            "amber".parse::<Phase>(),
            Err(ParsePhaseError("amber".to_owned()))
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for phase in [Phase::Red, Phase::Green] {
            assert_eq!(phase.to_string().parse(), Ok(phase));
        }
    }
}
