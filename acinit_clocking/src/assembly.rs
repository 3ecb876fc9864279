//! Static binding of clock domains to clock sources and resets.
//!
//! A [`DomainAssembly`] is built exactly once from references, synthesizers
//! and domain declarations, and is immutable afterwards. Building it is where
//! every wiring mistake is caught: unknown names, bad output indices,
//! synthesizer feedback loops, and synthesizer settings that could not lock.

use acinit_common::{
    BoardSpec, ClockSource, ConfigError, DomainSpec, ReferenceClock, SynthConfig,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::DomainKey;
use crate::synth::{SynthOutputs, synthesize};

/// A synthesizer whose input has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthNode {
    /// The validated configuration.
    pub config: SynthConfig,
    /// Period of the input clock.
    pub input_period_ps: u64,
    /// Absolute phase of the input clock.
    pub input_phase_ps: i64,
    /// The derived output clocks.
    pub outputs: SynthOutputs,
}

impl SynthNode {
    /// The synthesizer feeding this one, if it is cascaded.
    #[must_use]
    pub fn upstream(&self) -> Option<&str> {
        self.config.input.synthesizer_name()
    }
}

/// One named clock domain with its resolved clock and reset gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Domain name.
    pub key: DomainKey,
    /// The clock driving the domain.
    pub clock: ClockSource,
    /// Period of that clock.
    pub period_ps: u64,
    /// Time of the first rising edge, in `0..period_ps`.
    pub first_edge_ps: u64,
    /// Synthesizers whose lock must be held before reset is released.
    pub lock_sources: Vec<String>,
    /// Depth of the reset synchronizer.
    pub reset_stages: usize,
}

/// The validated, immutable clock tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAssembly {
    name: String,
    references: IndexMap<String, ReferenceClock>,
    synthesizers: IndexMap<String, SynthNode>,
    domains: IndexMap<DomainKey, Domain>,
}

impl DomainAssembly {
    /// Starts a builder for an assembly called `name`.
    pub fn builder(name: impl Into<String>) -> DomainAssemblyBuilder {
        DomainAssemblyBuilder::new(name)
    }

    /// Validates and assembles a board's clock tree.
    ///
    /// # Errors
    ///
    /// See [`DomainAssemblyBuilder::build`].
    pub fn from_board(board: &BoardSpec) -> Result<Self, ConfigError> {
        DomainAssemblyBuilder::from_board(board).build()
    }

    /// Name of the board or tree.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference clocks in declaration order.
    pub fn references(&self) -> impl Iterator<Item = &ReferenceClock> {
        self.references.values()
    }

    /// Synthesizers in dependency order: a synthesizer always follows the one feeding it.
    pub fn synthesizers(&self) -> impl Iterator<Item = (&str, &SynthNode)> {
        self.synthesizers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A synthesizer by name.
    #[must_use]
    pub fn synthesizer(&self, name: &str) -> Option<&SynthNode> {
        self.synthesizers.get(name)
    }

    /// Domains in declaration order.
    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    /// A domain by name.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Like [`Self::domain`], for callers that need the domain to exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDomain`] if no domain has that name.
    pub fn require_domain(&self, name: &str) -> Result<&Domain, ConfigError> {
        self.domain(name)
            .ok_or_else(|| ConfigError::UnknownDomain(name.to_string()))
    }
}

/// Collects clock tree declarations and validates them in [`Self::build`].
#[derive(Debug, Clone, Default)]
pub struct DomainAssemblyBuilder {
    name: String,
    references: Vec<ReferenceClock>,
    synthesizers: Vec<SynthConfig>,
    domains: Vec<DomainSpec>,
}

impl DomainAssemblyBuilder {
    /// An empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A builder holding every declaration of `board`.
    pub fn from_board(board: &BoardSpec) -> Self {
        Self {
            name: board.name.clone(),
            references: board.references.clone(),
            synthesizers: board.synthesizers.clone(),
            domains: board.domains.clone(),
        }
    }

    /// Declares a reference clock.
    pub fn reference(mut self, reference: ReferenceClock) -> Self {
        self.references.push(reference);
        self
    }

    /// Declares a synthesizer. Cascades may be declared in any order.
    pub fn synthesizer(mut self, synth: SynthConfig) -> Self {
        self.synthesizers.push(synth);
        self
    }

    /// Declares a clock domain.
    pub fn domain(mut self, domain: DomainSpec) -> Self {
        self.domains.push(domain);
        self
    }

    /// Validates every declaration and produces the immutable assembly.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyName`] for a reference, synthesizer or domain without a name
    /// - [`ConfigError::DuplicateName`] for a reused reference, synthesizer or domain name
    /// - [`ConfigError::ZeroPeriod`] for a reference without a period
    /// - [`ConfigError::UnknownReference`], [`ConfigError::UnknownSynthesizer`],
    ///   [`ConfigError::OutputIndexOutOfRange`] for dangling clock sources or lock gates
    /// - [`ConfigError::SynthesizerCycle`] if cascaded synthesizers feed back
    /// - any synthesizer validation error
    /// - [`ConfigError::TooFewResetStages`] and [`ConfigError::NoDomains`]
    pub fn build(self) -> Result<DomainAssembly, ConfigError> {
        let mut references = IndexMap::new();
        for reference in self.references {
            require_name("reference clock", &reference.name)?;
            reference.validate()?;
            if references.contains_key(&reference.name) {
                return Err(ConfigError::DuplicateName(reference.name));
            }
            references.insert(reference.name.clone(), reference);
        }

        let mut pending: IndexMap<String, SynthConfig> = IndexMap::new();
        for synth in self.synthesizers {
            require_name("synthesizer", &synth.name)?;
            if references.contains_key(&synth.name) || pending.contains_key(&synth.name) {
                return Err(ConfigError::DuplicateName(synth.name));
            }
            pending.insert(synth.name.clone(), synth);
        }

        // Resolve synthesizers in dependency order. A synthesizer is ready once
        // its input is a reference or an already resolved synthesizer; names
        // that are neither pending nor resolved fall through to the lookup
        // below and surface as unknown.
        let mut synthesizers: IndexMap<String, SynthNode> = IndexMap::new();
        while let Some(index) = pending.values().position(|cfg| match &cfg.input {
            ClockSource::Reference(_) => true,
            ClockSource::Synthesizer { name, .. } => !pending.contains_key(name),
        }) {
            let Some((name, config)) = pending.shift_remove_index(index) else {
                break;
            };
            let (input_period_ps, input_phase_ps) =
                resolve_source(&config.input, &references, &synthesizers)?;
            let outputs = synthesize(input_period_ps, &config)?;
            debug!(
                "Synthesizer '{}' resolved: input {} ps, outputs {:?}",
                name,
                input_period_ps,
                outputs.clocks.iter().map(|c| c.frequency_hz).collect::<Vec<_>>()
            );
            synthesizers.insert(
                name,
                SynthNode {
                    config,
                    input_period_ps,
                    input_phase_ps,
                    outputs,
                },
            );
        }
        if let Some(name) = pending.keys().next() {
            return Err(ConfigError::SynthesizerCycle(name.clone()));
        }

        if self.domains.is_empty() {
            return Err(ConfigError::NoDomains(self.name));
        }

        let mut domains = IndexMap::new();
        for spec in self.domains {
            require_name("clock domain", &spec.name)?;
            if domains.contains_key(spec.name.as_str()) {
                return Err(ConfigError::DuplicateName(spec.name));
            }
            if spec.reset_stages < 2 {
                return Err(ConfigError::TooFewResetStages {
                    domain: spec.name,
                    stages: spec.reset_stages,
                });
            }

            let (period_ps, phase_ps) = resolve_source(&spec.clock, &references, &synthesizers)?;

            let mut lock_sources: Vec<String> = Vec::new();
            let gates = spec
                .clock
                .synthesizer_name()
                .into_iter()
                .chain(spec.gated_by.iter().map(String::as_str));
            for synth in gates {
                if !synthesizers.contains_key(synth) {
                    return Err(ConfigError::UnknownSynthesizer(synth.to_string()));
                }
                if !lock_sources.iter().any(|s| s == synth) {
                    lock_sources.push(synth.to_string());
                }
            }

            let key = DomainKey::new(spec.name.as_str());
            let domain = Domain {
                key: key.clone(),
                clock: spec.clock,
                period_ps,
                first_edge_ps: phase_ps.rem_euclid(period_ps as i64) as u64,
                lock_sources,
                reset_stages: spec.reset_stages,
            };
            debug!(
                "Domain '{}' bound to {} ({} ps), reset gated by {:?}",
                key, domain.clock, domain.period_ps, domain.lock_sources
            );
            domains.insert(key, domain);
        }

        Ok(DomainAssembly {
            name: self.name,
            references,
            synthesizers,
            domains,
        })
    }
}

fn require_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyName { kind });
    }
    Ok(())
}

/// Period and absolute phase of a clock source.
fn resolve_source(
    source: &ClockSource,
    references: &IndexMap<String, ReferenceClock>,
    synthesizers: &IndexMap<String, SynthNode>,
) -> Result<(u64, i64), ConfigError> {
    match source {
        ClockSource::Reference(name) => references
            .get(name)
            .map(|r| (r.period_ps, 0))
            .ok_or_else(|| ConfigError::UnknownReference(name.clone())),
        ClockSource::Synthesizer { name, output } => {
            let node = synthesizers
                .get(name)
                .ok_or_else(|| ConfigError::UnknownSynthesizer(name.clone()))?;
            let clock = node
                .outputs
                .get(*output)
                .ok_or_else(|| ConfigError::OutputIndexOutOfRange {
                    synth: name.clone(),
                    output: *output,
                    available: node.outputs.len(),
                })?;
            Ok((clock.period_ps, node.input_phase_ps + clock.phase_ps))
        }
    }
}
