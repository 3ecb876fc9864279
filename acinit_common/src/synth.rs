//! Frequency synthesizer configuration.
//!
//! The synthesizer itself is an opaque vendor primitive. What we own is its
//! configuration, and the job of rejecting any configuration that could not
//! lock before a design is ever run. The limits default to those of a
//! Cyclone 10 LP / MAX 10 class general purpose PLL.

use serde::{Deserialize, Serialize};

use crate::{ClockSource, ConfigError, PS_PER_SECOND};

/// Default time from a stable input clock to `locked`, in picoseconds (10 us).
pub const DEFAULT_LOCK_TIME_PS: u64 = 10_000_000;

/// Parameters of one synthesizer output counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Feedback multiplier applied to the input frequency.
    pub multiply: u32,
    /// Post divider applied after multiplication.
    pub divide: u32,
    /// Phase shift relative to the reference, in picoseconds. May be negative.
    pub phase_shift_ps: i64,
    /// High time as a percentage of the period.
    pub duty_cycle: u8,
}

impl OutputConfig {
    /// An output at `input * multiply / divide`, in phase, 50% duty.
    pub fn new(multiply: u32, divide: u32) -> Self {
        Self {
            multiply,
            divide,
            phase_shift_ps: 0,
            duty_cycle: 50,
        }
    }

    /// Shifts the output by `phase_shift_ps` picoseconds.
    pub fn with_phase_shift(mut self, phase_shift_ps: i64) -> Self {
        self.phase_shift_ps = phase_shift_ps;
        self
    }

    /// Sets the high time in percent.
    pub fn with_duty_cycle(mut self, duty_cycle: u8) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    /// Output period for the given input period, rounded to the nearest picosecond.
    #[must_use]
    pub fn output_period_ps(&self, input_period_ps: u64) -> u64 {
        let num = u128::from(input_period_ps) * u128::from(self.divide);
        let den = u128::from(self.multiply.max(1));
        ((num + den / 2) / den) as u64
    }

    /// Output frequency for the given input period, rounded to the nearest Hz.
    #[must_use]
    pub fn output_frequency_hz(&self, input_period_ps: u64) -> u64 {
        let num = u128::from(PS_PER_SECOND) * u128::from(self.multiply);
        let den = u128::from(input_period_ps) * u128::from(self.divide.max(1));
        if den == 0 {
            return 0;
        }
        ((num + den / 2) / den) as u64
    }
}

/// Device limits a configuration is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SynthLimits {
    /// Largest multiply factor.
    pub max_multiply: u32,
    /// Largest divide factor.
    pub max_divide: u32,
    /// Slowest usable input clock.
    pub min_input_hz: u64,
    /// Fastest usable input clock.
    pub max_input_hz: u64,
    /// Slowest output the counters can produce.
    pub min_output_hz: u64,
    /// Fastest output the counters can produce.
    pub max_output_hz: u64,
}

impl Default for SynthLimits {
    fn default() -> Self {
        Self {
            max_multiply: 512,
            max_divide: 512,
            min_input_hz: 5_000_000,
            max_input_hz: 472_500_000,
            min_output_hz: 10_000,
            max_output_hz: 472_500_000,
        }
    }
}

/// A named synthesizer instance: one input clock, one or more output counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Instance name, unique among references and synthesizers.
    pub name: String,
    /// The clock driving this synthesizer.
    pub input: ClockSource,
    /// Output counters, indexed by output number.
    pub outputs: Vec<OutputConfig>,
    /// Time the primitive needs from a stable input to asserting `locked`.
    pub lock_time_ps: u64,
}

impl SynthConfig {
    /// A synthesizer without outputs and with the default lock time.
    pub fn new(name: impl Into<String>, input: ClockSource) -> Self {
        Self {
            name: name.into(),
            input,
            outputs: Vec::new(),
            lock_time_ps: DEFAULT_LOCK_TIME_PS,
        }
    }

    /// Appends the next output counter.
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.outputs.push(output);
        self
    }

    /// Overrides [`DEFAULT_LOCK_TIME_PS`].
    pub fn with_lock_time(mut self, lock_time_ps: u64) -> Self {
        self.lock_time_ps = lock_time_ps;
        self
    }

    /// Validates against [`SynthLimits::default`].
    ///
    /// # Errors
    ///
    /// See [`Self::validate_with`].
    pub fn validate(&self, input_period_ps: u64) -> Result<(), ConfigError> {
        self.validate_with(input_period_ps, &SynthLimits::default())
    }

    /// Checks that every output can be produced from an input of the given
    /// period within `limits`.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: missing outputs, multiply or
    /// divide factors out of range, input or output frequency out of range,
    /// duty cycle outside 1..=99, or a phase shift of a full period or more.
    pub fn validate_with(
        &self,
        input_period_ps: u64,
        limits: &SynthLimits,
    ) -> Result<(), ConfigError> {
        if self.outputs.is_empty() {
            return Err(ConfigError::NoOutputs {
                synth: self.name.clone(),
            });
        }

        let input_hz = if input_period_ps == 0 {
            0
        } else {
            crate::period_to_hz(input_period_ps)
        };
        if !(limits.min_input_hz..=limits.max_input_hz).contains(&input_hz) {
            return Err(ConfigError::InputFrequencyOutOfRange {
                synth: self.name.clone(),
                hz: input_hz,
                min: limits.min_input_hz,
                max: limits.max_input_hz,
            });
        }

        for (output, cfg) in self.outputs.iter().enumerate() {
            if !(1..=limits.max_multiply).contains(&cfg.multiply) {
                return Err(ConfigError::MultiplyOutOfRange {
                    synth: self.name.clone(),
                    output,
                    value: cfg.multiply,
                    max: limits.max_multiply,
                });
            }
            if !(1..=limits.max_divide).contains(&cfg.divide) {
                return Err(ConfigError::DivideOutOfRange {
                    synth: self.name.clone(),
                    output,
                    value: cfg.divide,
                    max: limits.max_divide,
                });
            }
            if !(1..=99).contains(&cfg.duty_cycle) {
                return Err(ConfigError::DutyCycleOutOfRange {
                    synth: self.name.clone(),
                    output,
                    value: cfg.duty_cycle,
                });
            }

            let hz = cfg.output_frequency_hz(input_period_ps);
            if !(limits.min_output_hz..=limits.max_output_hz).contains(&hz) {
                return Err(ConfigError::OutputFrequencyOutOfRange {
                    synth: self.name.clone(),
                    output,
                    hz,
                    min: limits.min_output_hz,
                    max: limits.max_output_hz,
                });
            }

            let period_ps = cfg.output_period_ps(input_period_ps);
            if cfg.phase_shift_ps.unsigned_abs() >= period_ps {
                return Err(ConfigError::PhaseShiftOutOfRange {
                    synth: self.name.clone(),
                    output,
                    phase_ps: cfg.phase_shift_ps,
                    period_ps,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn audio_pll() -> SynthConfig {
        SynthConfig::new("audio", ClockSource::reference("usb"))
            .with_output(OutputConfig::new(17, 83))
    }

    #[test]
    fn audio_pll_derives_mclk() {
        let out = &audio_pll().outputs[0];
        // 60 MHz * 17 / 83 = 12.289 MHz, within 0.01% of 12.288 MHz.
        let hz = out.output_frequency_hz(16_667);
        assert!((12_287_000..12_291_000).contains(&hz), "{hz}");
        assert_eq!(out.output_period_ps(16_667), 81_374);
        assert!(audio_pll().validate(16_667).is_ok());
    }

    #[rstest]
    #[case(OutputConfig::new(0, 1))]
    #[case(OutputConfig::new(513, 1))]
    fn multiply_out_of_range(#[case] out: OutputConfig) {
        let cfg = SynthConfig::new("p", ClockSource::reference("r")).with_output(out);
        assert!(matches!(
            cfg.validate(20_000),
            Err(ConfigError::MultiplyOutOfRange { .. })
        ));
    }

    #[rstest]
    #[case(OutputConfig::new(1, 0))]
    #[case(OutputConfig::new(1, 1000))]
    fn divide_out_of_range(#[case] out: OutputConfig) {
        let cfg = SynthConfig::new("p", ClockSource::reference("r")).with_output(out);
        assert!(matches!(
            cfg.validate(20_000),
            Err(ConfigError::DivideOutOfRange { .. })
        ));
    }

    #[test]
    fn output_too_fast() {
        // 50 MHz * 20 = 1 GHz
        let cfg = SynthConfig::new("p", ClockSource::reference("r"))
            .with_output(OutputConfig::new(20, 1));
        assert!(matches!(
            cfg.validate(20_000),
            Err(ConfigError::OutputFrequencyOutOfRange { output: 0, .. })
        ));
    }

    #[test]
    fn input_too_slow() {
        // 1 MHz reference
        let cfg = audio_pll();
        assert!(matches!(
            cfg.validate(1_000_000),
            Err(ConfigError::InputFrequencyOutOfRange { .. })
        ));
    }

    #[test]
    fn phase_shift_of_a_full_period_is_rejected() {
        let ok = SynthConfig::new("p", ClockSource::reference("r"))
            .with_output(OutputConfig::new(1, 1).with_phase_shift(-5556));
        assert!(ok.validate(16_666).is_ok());

        let bad = SynthConfig::new("p", ClockSource::reference("r"))
            .with_output(OutputConfig::new(1, 1).with_phase_shift(16_666));
        assert!(matches!(
            bad.validate(16_666),
            Err(ConfigError::PhaseShiftOutOfRange { .. })
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(100)]
    fn duty_cycle_out_of_range(#[case] duty: u8) {
        let cfg = SynthConfig::new("p", ClockSource::reference("r"))
            .with_output(OutputConfig::new(1, 1).with_duty_cycle(duty));
        assert!(matches!(
            cfg.validate(20_000),
            Err(ConfigError::DutyCycleOutOfRange { .. })
        ));
    }

    #[test]
    fn no_outputs() {
        let cfg = SynthConfig::new("p", ClockSource::reference("r"));
        assert!(matches!(cfg.validate(20_000), Err(ConfigError::NoOutputs { .. })));
    }
}
