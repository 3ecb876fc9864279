//! Multi-domain clock scheduling.
//!
//! [`ClockTree`] owns the runtime side of a [`DomainAssembly`]: one lock model
//! per synthesizer, one reset synchronizer per domain, and the time of every
//! domain's next rising edge. Each call to [`ClockTree::advance`] jumps to the
//! earliest pending edge and reports every domain that ticks at that instant,
//! together with the reset level its logic samples on that edge.

use std::sync::Arc;

use acinit_common::ConfigError;
use tracing::{debug, trace};

use crate::assembly::DomainAssembly;
use crate::reset::ResetSynchronizer;
use crate::synth::{LockModel, PllModel};
use crate::DomainKey;

/// A rising edge of one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEdge {
    /// The ticking domain.
    pub domain: DomainKey,
    /// Zero-based count of this domain's edges.
    pub cycle: u64,
    /// Reset level during the cycle that this edge closes.
    pub in_reset: bool,
}

/// All edges that happen at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// Absolute time of the instant.
    pub time_ps: u64,
    /// Edges in domain declaration order.
    pub edges: Vec<DomainEdge>,
}

impl Tick {
    /// The edge of `domain` at this instant, if it ticks.
    #[must_use]
    pub fn edge(&self, domain: &str) -> Option<&DomainEdge> {
        self.edges.iter().find(|e| e.domain.name() == domain)
    }
}

#[derive(Debug)]
struct SynthRuntime {
    name: String,
    upstream: Option<usize>,
    model: Box<dyn LockModel>,
}

#[derive(Debug)]
struct DomainRuntime {
    key: DomainKey,
    period_ps: u64,
    next_edge_ps: u64,
    cycles: u64,
    lock_sources: Vec<usize>,
    reset: ResetSynchronizer,
    in_reset: bool,
}

/// Runtime state of a clock tree on a picosecond timeline.
#[derive(Debug)]
pub struct ClockTree {
    assembly: Arc<DomainAssembly>,
    now_ps: u64,
    synths: Vec<SynthRuntime>,
    domains: Vec<DomainRuntime>,
}

impl ClockTree {
    /// Powers up `assembly`: time zero, no synthesizer locked, every domain in reset.
    pub fn new(assembly: Arc<DomainAssembly>) -> Self {
        let names: Vec<&str> = assembly.synthesizers().map(|(name, _)| name).collect();
        let index_of = |name: &str| names.iter().position(|n| *n == name);

        let synths = assembly
            .synthesizers()
            .map(|(name, node)| SynthRuntime {
                name: name.to_string(),
                upstream: node.upstream().and_then(index_of),
                model: Box::new(PllModel::new(node.config.lock_time_ps)),
            })
            .collect();

        let domains = assembly
            .domains()
            .map(|d| DomainRuntime {
                key: d.key.clone(),
                period_ps: d.period_ps,
                next_edge_ps: d.first_edge_ps,
                cycles: 0,
                lock_sources: d
                    .lock_sources
                    .iter()
                    .filter_map(|s| index_of(s))
                    .collect(),
                reset: ResetSynchronizer::new(d.reset_stages),
                in_reset: true,
            })
            .collect();

        Self {
            assembly,
            now_ps: 0,
            synths,
            domains,
        }
    }

    /// Replaces the lock behavior of one synthesizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSynthesizer`] if the assembly has no such synthesizer.
    pub fn set_lock_model(
        &mut self,
        synth: &str,
        model: Box<dyn LockModel>,
    ) -> Result<(), ConfigError> {
        let runtime = self
            .synths
            .iter_mut()
            .find(|s| s.name == synth)
            .ok_or_else(|| ConfigError::UnknownSynthesizer(synth.to_string()))?;
        runtime.model = model;
        Ok(())
    }

    /// The static clock tree.
    #[must_use]
    pub fn assembly(&self) -> &Arc<DomainAssembly> {
        &self.assembly
    }

    /// Time of the last instant reported by [`Self::advance`].
    #[must_use]
    pub const fn now_ps(&self) -> u64 {
        self.now_ps
    }

    /// Lock state of a synthesizer as of the current instant.
    #[must_use]
    pub fn locked(&self, synth: &str) -> Option<bool> {
        self.synths
            .iter()
            .find(|s| s.name == synth)
            .map(|s| s.model.locked())
    }

    /// Current reset level of a domain.
    #[must_use]
    pub fn in_reset(&self, domain: &str) -> Option<bool> {
        self.domains
            .iter()
            .find(|d| d.key.name() == domain)
            .map(|d| d.reset.asserted(self.all_locked(d)))
    }

    /// Number of edges a domain has seen so far.
    #[must_use]
    pub fn cycles(&self, domain: &str) -> Option<u64> {
        self.domains
            .iter()
            .find(|d| d.key.name() == domain)
            .map(|d| d.cycles)
    }

    fn all_locked(&self, domain: &DomainRuntime) -> bool {
        domain
            .lock_sources
            .iter()
            .all(|&i| self.synths[i].model.locked())
    }

    fn update_locks(&mut self, now_ps: u64) {
        // Dependency order: an upstream synthesizer is always updated first.
        for i in 0..self.synths.len() {
            let (updated, rest) = self.synths.split_at_mut(i);
            let synth = &mut rest[0];
            let input_stable = synth
                .upstream
                .is_none_or(|u| updated.get(u).is_some_and(|s| s.model.locked()));
            let was_locked = synth.model.locked();
            let locked = synth.model.update(now_ps, input_stable);
            if locked != was_locked {
                debug!(
                    "Synthesizer '{}' {} at {} ps",
                    synth.name,
                    if locked { "locked" } else { "lost lock" },
                    now_ps
                );
            }
        }
    }

    /// Advances to the next instant at which at least one domain ticks.
    pub fn advance(&mut self) -> Tick {
        let Some(now_ps) = self.domains.iter().map(|d| d.next_edge_ps).min() else {
            return Tick {
                time_ps: self.now_ps,
                edges: Vec::new(),
            };
        };
        self.now_ps = now_ps;
        self.update_locks(now_ps);

        let locks: Vec<bool> = self.domains.iter().map(|d| self.all_locked(d)).collect();
        let mut edges = Vec::new();

        for (domain, all_locked) in self.domains.iter_mut().zip(locks) {
            if !all_locked {
                domain.reset.clear();
            }
            if domain.next_edge_ps != now_ps {
                continue;
            }

            let in_reset = domain.reset.asserted(all_locked);
            if in_reset != domain.in_reset {
                debug!(
                    "Domain '{}' reset {} at {} ps (cycle {})",
                    domain.key,
                    if in_reset { "asserted" } else { "released" },
                    now_ps,
                    domain.cycles
                );
                domain.in_reset = in_reset;
            }
            domain.reset.step(all_locked);

            edges.push(DomainEdge {
                domain: domain.key.clone(),
                cycle: domain.cycles,
                in_reset,
            });
            domain.cycles += 1;
            domain.next_edge_ps += domain.period_ps;
        }

        trace!("Tick at {} ps: {} edge(s)", now_ps, edges.len());
        Tick {
            time_ps: now_ps,
            edges,
        }
    }
}
