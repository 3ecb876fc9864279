//! Board clocking presets.
//!
//! A [`BoardSpec`] is the declarative description of a board's clock tree:
//! which reference pins exist, which synthesizers derive clocks from them, and
//! which named domains are clocked and reset by what. It is plain data; the
//! clocking crate validates it and turns it into an operational assembly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ClockSource, ConfigError, OutputConfig, ReferenceClock, SynthConfig};

/// Default depth of a domain's reset synchronizer.
pub const DEFAULT_RESET_STAGES: usize = 2;

/// One named clock domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Domain name, such as `sync`.
    pub name: String,
    /// The clock driving the domain.
    pub clock: ClockSource,
    /// Extra synthesizers whose lock also gates this domain's reset. The
    /// synthesizer behind `clock`, if any, always gates it.
    pub gated_by: Vec<String>,
    /// Depth of the reset synchronizer, at least 2.
    pub reset_stages: usize,
}

impl DomainSpec {
    /// A domain gated only by its own clock source.
    pub fn new(name: impl Into<String>, clock: ClockSource) -> Self {
        Self {
            name: name.into(),
            clock,
            gated_by: Vec::new(),
            reset_stages: DEFAULT_RESET_STAGES,
        }
    }

    /// Also holds the domain in reset until `synth` locks.
    pub fn gated_by(mut self, synth: impl Into<String>) -> Self {
        self.gated_by.push(synth.into());
        self
    }

    /// Overrides [`DEFAULT_RESET_STAGES`].
    pub fn with_reset_stages(mut self, stages: usize) -> Self {
        self.reset_stages = stages;
        self
    }
}

/// Declarative clock tree of one board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoardSpec {
    /// Board name, used to label assemblies and reports.
    pub name: String,
    /// Reference clock pins.
    pub references: Vec<ReferenceClock>,
    /// Synthesizers, in any order.
    pub synthesizers: Vec<SynthConfig>,
    /// Clock domains.
    pub domains: Vec<DomainSpec>,
}

impl BoardSpec {
    /// An empty board.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a reference clock.
    pub fn with_reference(mut self, reference: ReferenceClock) -> Self {
        self.references.push(reference);
        self
    }

    /// Adds a synthesizer.
    pub fn with_synthesizer(mut self, synth: SynthConfig) -> Self {
        self.synthesizers.push(synth);
        self
    }

    /// Adds a clock domain.
    pub fn with_domain(mut self, domain: DomainSpec) -> Self {
        self.domains.push(domain);
        self
    }

    /// Whether a domain of this name is declared.
    #[must_use]
    pub fn has_domain(&self, name: &str) -> bool {
        self.domains.iter().any(|d| d.name == name)
    }
}

/// Boards with a known clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardPreset {
    /// Arrow DECA (MAX 10), clocked from the 60 MHz ULPI PHY clock.
    ArrowDeca,
    /// QMTech Cyclone 10 LP 10CL006 core board, clocked from its 50 MHz oscillator.
    Qmtech10cl006,
}

impl BoardPreset {
    /// Every preset, in listing order.
    pub const ALL: [Self; 2] = [Self::ArrowDeca, Self::Qmtech10cl006];

    /// Name used on the command line and in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ArrowDeca => "arrow-deca",
            Self::Qmtech10cl006 => "qmtech-10cl006",
        }
    }

    /// The board's clock tree, including the codec MCLK synthesizer feeding
    /// the `audio` domain.
    #[must_use]
    pub fn spec(self) -> BoardSpec {
        match self {
            Self::ArrowDeca => arrow_deca(),
            Self::Qmtech10cl006 => qmtech_10cl006(),
        }
    }
}

impl fmt::Display for BoardPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| ConfigError::UnknownBoard(s.to_string()))
    }
}

/// Codec MCLK: 60 MHz * 17 / 83 ~= 12.288 MHz = 48 kHz * 256.
fn audio_mclk_pll(input: ClockSource) -> SynthConfig {
    SynthConfig::new("audio", input).with_output(OutputConfig::new(17, 83))
}

fn arrow_deca() -> BoardSpec {
    BoardSpec::new("arrow-deca")
        .with_reference(ReferenceClock::new("clk60", 16_666))
        .with_synthesizer(
            SynthConfig::new("main", ClockSource::reference("clk60"))
                .with_output(OutputConfig::new(1, 1).with_phase_shift(-5556))
                .with_output(OutputConfig::new(2, 1)),
        )
        .with_synthesizer(audio_mclk_pll(ClockSource::synthesizer("main", 0)))
        .with_domain(DomainSpec::new("usb", ClockSource::synthesizer("main", 0)))
        .with_domain(DomainSpec::new("sync", ClockSource::synthesizer("main", 0)))
        .with_domain(DomainSpec::new("fast", ClockSource::synthesizer("main", 1)))
        .with_domain(DomainSpec::new("audio", ClockSource::synthesizer("audio", 0)))
}

fn qmtech_10cl006() -> BoardSpec {
    // usb, sync, fast and sound share one reset held until both system PLLs lock.
    let shared = |name: &str, clock: ClockSource| {
        DomainSpec::new(name, clock)
            .gated_by("main")
            .gated_by("sound")
    };

    BoardSpec::new("qmtech-10cl006")
        .with_reference(ReferenceClock::new("clk50", 20_000))
        .with_synthesizer(
            SynthConfig::new("main", ClockSource::reference("clk50"))
                // 100 MHz
                .with_output(OutputConfig::new(2, 1))
                // 60 MHz
                .with_output(OutputConfig::new(6, 5)),
        )
        .with_synthesizer(
            // 3.072 MHz = 48 kHz * 32 bit * 2 channels
            SynthConfig::new("sound", ClockSource::synthesizer("main", 1))
                .with_output(OutputConfig::new(17, 83 * 4)),
        )
        .with_synthesizer(audio_mclk_pll(ClockSource::synthesizer("main", 1)))
        .with_domain(shared("fast", ClockSource::synthesizer("main", 0)))
        .with_domain(shared("usb", ClockSource::synthesizer("main", 1)))
        .with_domain(shared("sync", ClockSource::synthesizer("main", 1)))
        .with_domain(shared("sound", ClockSource::synthesizer("sound", 0)))
        .with_domain(DomainSpec::new("audio", ClockSource::synthesizer("audio", 0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_round_trip_through_names() {
        for preset in BoardPreset::ALL {
            assert_eq!(preset.name().parse::<BoardPreset>().unwrap(), preset);
            assert_eq!(preset.spec().name, preset.name());
        }
        assert!(matches!(
            "de0-nano".parse::<BoardPreset>(),
            Err(ConfigError::UnknownBoard(_))
        ));
    }

    #[test]
    fn every_preset_declares_sync_and_audio() {
        for preset in BoardPreset::ALL {
            let spec = preset.spec();
            assert!(spec.has_domain("sync"), "{preset}");
            assert!(spec.has_domain("audio"), "{preset}");
        }
    }

    #[test]
    fn qmtech_shared_reset_is_gated_by_both_plls() {
        let spec = BoardPreset::Qmtech10cl006.spec();
        let sound = spec.domains.iter().find(|d| d.name == "sound").unwrap();
        assert_eq!(sound.gated_by, vec!["main".to_string(), "sound".to_string()]);
    }
}
