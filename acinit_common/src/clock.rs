//! Reference clocks and clock source selection.

use std::fmt;

use contracts::*;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Picoseconds per second.
pub const PS_PER_SECOND: u64 = 1_000_000_000_000;

/// Converts a period in picoseconds to a frequency in Hz, rounded to nearest.
#[must_use]
#[requires(period_ps > 0)]
pub fn period_to_hz(period_ps: u64) -> u64 {
    (PS_PER_SECOND + period_ps / 2) / period_ps
}

/// Converts a frequency in Hz to a period in picoseconds, rounded to nearest.
#[must_use]
#[requires(hz > 0)]
pub fn hz_to_period(hz: u64) -> u64 {
    (PS_PER_SECOND + hz / 2) / hz
}

/// An external reference clock entering the design on a pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceClock {
    /// Name used to refer to this clock from synthesizers and domains.
    pub name: String,
    /// Period in picoseconds, as given to vendor PLL primitives.
    pub period_ps: u64,
}

impl ReferenceClock {
    /// A reference clock with the given period.
    pub fn new(name: impl Into<String>, period_ps: u64) -> Self {
        Self {
            name: name.into(),
            period_ps,
        }
    }

    /// A reference clock with the period nearest to `hz`.
    pub fn from_hz(name: impl Into<String>, hz: u64) -> Self {
        Self::new(name, hz_to_period(hz))
    }

    /// Nominal frequency in Hz.
    #[must_use]
    pub fn frequency_hz(&self) -> u64 {
        period_to_hz(self.period_ps)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPeriod`] for a zero period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ps == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Where a clock comes from: a raw reference pin or one output of a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockSource {
    /// A reference clock, by name.
    Reference(String),
    /// Output `output` of the named synthesizer.
    Synthesizer {
        /// Synthesizer name.
        name: String,
        /// Output index.
        output: usize,
    },
}

impl ClockSource {
    /// The named reference clock.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    /// Output `output` of the named synthesizer.
    pub fn synthesizer(name: impl Into<String>, output: usize) -> Self {
        Self::Synthesizer {
            name: name.into(),
            output,
        }
    }

    /// Name of the synthesizer behind this source, if any.
    #[must_use]
    pub fn synthesizer_name(&self) -> Option<&str> {
        match self {
            Self::Reference(_) => None,
            Self::Synthesizer { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(name) => write!(f, "{name}"),
            Self::Synthesizer { name, output } => write!(f, "{name}.clk{output}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_periods_round_to_expected_frequencies() {
        assert_eq!(period_to_hz(16_667), 59_998_800);
        assert_eq!(period_to_hz(20_000), 50_000_000);
        assert_eq!(hz_to_period(60_000_000), 16_667);
    }

    #[test]
    fn zero_period_is_rejected() {
        let clk = ReferenceClock::new("clk0", 0);
        assert!(matches!(clk.validate(), Err(ConfigError::ZeroPeriod { .. })));
    }

    #[test]
    fn source_display() {
        assert_eq!(ClockSource::reference("clk60").to_string(), "clk60");
        assert_eq!(ClockSource::synthesizer("main", 1).to_string(), "main.clk1");
    }
}
