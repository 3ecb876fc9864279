//! Lock-gated reset synchronizer.
//!
//! Reset is asserted asynchronously: the moment any contributing synthesizer
//! reports "not locked" the chain is cleared and the domain is in reset. It is
//! released synchronously: a `1` has to walk through every stage on the
//! destination clock, so release happens no sooner than `stages` destination
//! edges after the last synthesizer locked.

use contracts::*;

/// A shift-register reset synchronizer for one clock domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetSynchronizer {
    chain: Vec<bool>,
}

impl ResetSynchronizer {
    /// Creates a synchronizer with `stages` flip-flops, in reset.
    #[requires(stages >= 2)]
    #[ensures(ret.stages() == stages)]
    pub fn new(stages: usize) -> Self {
        Self {
            chain: vec![false; stages],
        }
    }

    /// Number of flip-flops in the chain.
    #[must_use]
    pub fn stages(&self) -> usize {
        self.chain.len()
    }

    /// The reset level seen by the domain's logic right now.
    #[must_use]
    pub fn asserted(&self, all_locked: bool) -> bool {
        !all_locked || !self.chain.last().copied().unwrap_or(false)
    }

    /// Asynchronous clear, applied whenever a lock source drops.
    #[ensures(self.asserted(true))]
    pub fn clear(&mut self) {
        self.chain.iter_mut().for_each(|s| *s = false);
    }

    /// One destination clock edge.
    pub fn step(&mut self, all_locked: bool) {
        if !all_locked {
            self.clear();
            return;
        }
        self.chain.rotate_right(1);
        self.chain[0] = true;
    }
}
