//! The frequency synthesizer contract.
//!
//! A synthesizer is treated as a black box with two observable behaviors: the
//! periods of its derived clocks, which are a pure function of its input and
//! configuration, and a `locked` flag, which depends on time and on whether
//! its input clock is itself stable.

use std::fmt;
use std::ops::Range;

use acinit_common::{ConfigError, SynthConfig};
use contracts::*;

/// One output clock of a synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedClock {
    /// Period, rounded to the nearest picosecond.
    pub period_ps: u64,
    /// Phase offset relative to the synthesizer input, in picoseconds.
    pub phase_ps: i64,
    /// Frequency, rounded to the nearest Hz.
    pub frequency_hz: u64,
    /// High time in percent.
    pub duty_cycle: u8,
}

/// Every output clock of one synthesizer, indexed like its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthOutputs {
    /// One clock per configured output.
    pub clocks: Vec<DerivedClock>,
}

impl SynthOutputs {
    /// Output `output`, if configured.
    #[must_use]
    pub fn get(&self, output: usize) -> Option<&DerivedClock> {
        self.clocks.get(output)
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Whether there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}

/// Computes the derived clocks of `config` driven by an input of `input_period_ps`.
///
/// # Errors
///
/// Returns the validation error if the configuration cannot lock on this input.
#[ensures(ret.as_ref().map_or(true, |o| o.len() == config.outputs.len()))]
pub fn synthesize(input_period_ps: u64, config: &SynthConfig) -> Result<SynthOutputs, ConfigError> {
    config.validate(input_period_ps)?;

    let clocks = config
        .outputs
        .iter()
        .map(|out| DerivedClock {
            period_ps: out.output_period_ps(input_period_ps),
            phase_ps: out.phase_shift_ps,
            frequency_hz: out.output_frequency_hz(input_period_ps),
            duty_cycle: out.duty_cycle,
        })
        .collect();

    Ok(SynthOutputs { clocks })
}

/// Time dependent behavior of a synthesizer's `locked` output.
pub trait LockModel: fmt::Debug + Send {
    /// Observes the synthesizer at `now_ps` and returns its lock state.
    ///
    /// `input_stable` is false while the synthesizer's own input clock is not
    /// yet usable (an upstream synthesizer has not locked).
    fn update(&mut self, now_ps: u64, input_stable: bool) -> bool;

    /// Lock state as of the last [`Self::update`].
    fn locked(&self) -> bool;
}

/// A PLL that locks a fixed time after its input becomes stable.
///
/// Loss-of-lock windows can be scripted with [`Self::with_dropout`]; after a
/// dropout the full acquisition time has to elapse again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PllModel {
    lock_time_ps: u64,
    stable_since: Option<u64>,
    dropouts: Vec<Range<u64>>,
    locked: bool,
}

impl PllModel {
    /// A PLL that needs `lock_time_ps` of stable input to lock.
    #[must_use]
    pub fn new(lock_time_ps: u64) -> Self {
        Self {
            lock_time_ps,
            stable_since: None,
            dropouts: Vec::new(),
            locked: false,
        }
    }

    /// Forces the PLL out of lock for the interval `window` (picoseconds).
    #[must_use]
    pub fn with_dropout(mut self, window: Range<u64>) -> Self {
        self.dropouts.push(window);
        self
    }

    /// Acquisition time.
    #[must_use]
    pub const fn lock_time_ps(&self) -> u64 {
        self.lock_time_ps
    }
}

impl LockModel for PllModel {
    fn update(&mut self, now_ps: u64, input_stable: bool) -> bool {
        let dropped = self.dropouts.iter().any(|w| w.contains(&now_ps));
        if !input_stable || dropped {
            self.stable_since = None;
            self.locked = false;
        } else {
            let since = *self.stable_since.get_or_insert(now_ps);
            self.locked = now_ps.saturating_sub(since) >= self.lock_time_ps;
        }
        self.locked
    }

    fn locked(&self) -> bool {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acinit_common::{ClockSource, OutputConfig};

    #[test]
    fn synthesize_derives_periods() {
        let cfg = SynthConfig::new("main", ClockSource::reference("clk50"))
            .with_output(OutputConfig::new(2, 1))
            .with_output(OutputConfig::new(6, 5));
        let out = synthesize(20_000, &cfg).unwrap();
        assert_eq!(out.get(0).unwrap().period_ps, 10_000);
        assert_eq!(out.get(0).unwrap().frequency_hz, 100_000_000);
        assert_eq!(out.get(1).unwrap().period_ps, 16_667);
        assert_eq!(out.get(1).unwrap().frequency_hz, 60_000_000);
    }

    #[test]
    fn synthesize_rejects_invalid_config() {
        let cfg = SynthConfig::new("main", ClockSource::reference("clk50"))
            .with_output(OutputConfig::new(0, 1));
        assert!(synthesize(20_000, &cfg).is_err());
    }

    #[test]
    fn pll_locks_after_acquisition_time() {
        let mut pll = PllModel::new(1_000);
        assert!(!pll.update(0, true));
        assert!(!pll.update(999, true));
        assert!(pll.update(1_000, true));
        assert!(pll.locked());
    }

    #[test]
    fn pll_waits_for_stable_input() {
        let mut pll = PllModel::new(1_000);
        assert!(!pll.update(0, false));
        assert!(!pll.update(5_000, false));
        assert!(!pll.update(5_500, true));
        assert!(pll.update(6_500, true));
    }

    #[test]
    fn pll_dropout_restarts_acquisition() {
        let mut pll = PllModel::new(1_000).with_dropout(2_000..2_100);
        assert!(!pll.update(0, true));
        assert!(pll.update(1_000, true));
        assert!(!pll.update(2_050, true));
        assert!(!pll.update(2_100, true));
        assert!(!pll.update(3_000, true));
        assert!(pll.update(3_100, true));
    }

    #[test]
    fn zero_lock_time_locks_on_first_observation() {
        let mut pll = PllModel::new(0);
        assert!(pll.update(42, true));
    }
}
