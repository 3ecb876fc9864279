//! Completion latch.
//!
//! The streamer's `done` is a state-derived level that only exists inside the
//! operating domain. [`DoneLatch`] registers it into a sticky level and, when
//! the consumer lives elsewhere, carries that level across with a two-stage
//! synchronizer clocked by the observing domain. The destination is fixed
//! when the latch is built.

use std::fmt;

use acinit_clocking::DomainKey;
use tracing::debug;

use crate::cdc::{DEFAULT_SYNC_STAGES, FfSynchronizer};

/// The domain in which the done level is observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DoneDestination {
    /// Observed in the sequencer's own domain.
    #[default]
    Local,
    /// Observed in `domain`, behind a flip-flop synchronizer.
    Resynchronized {
        /// The observing domain.
        domain: DomainKey,
    },
}

impl DoneDestination {
    /// Observed in `domain`.
    pub fn resynchronized(domain: impl Into<DomainKey>) -> Self {
        Self::Resynchronized {
            domain: domain.into(),
        }
    }

    /// The observing domain, given the sequencer's own.
    #[must_use]
    pub fn domain<'a>(&'a self, operating: &'a DomainKey) -> &'a DomainKey {
        match self {
            Self::Local => operating,
            Self::Resynchronized { domain } => domain,
        }
    }
}

impl fmt::Display for DoneDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Resynchronized { domain } => write!(f, "resynchronized into '{domain}'"),
        }
    }
}

/// Sticky done level with an optional crossing into an observing domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneLatch {
    destination: DoneDestination,
    latched: bool,
    sync: Option<FfSynchronizer>,
}

impl DoneLatch {
    /// A cleared latch for `destination`.
    #[must_use]
    pub fn new(destination: DoneDestination) -> Self {
        let sync = match destination {
            DoneDestination::Local => None,
            DoneDestination::Resynchronized { .. } => {
                Some(FfSynchronizer::new(DEFAULT_SYNC_STAGES))
            }
        };
        Self {
            destination,
            latched: false,
            sync,
        }
    }

    /// Where the level is observed.
    #[must_use]
    pub fn destination(&self) -> &DoneDestination {
        &self.destination
    }

    /// The registered level in the sequencer's domain.
    #[must_use]
    pub const fn source_level(&self) -> bool {
        self.latched
    }

    /// The level as seen in the destination domain.
    #[must_use]
    pub fn level(&self) -> bool {
        match &self.sync {
            None => self.latched,
            Some(sync) => sync.output(),
        }
    }

    /// Sequencer domain edge.
    pub fn latch_step(&mut self, done: bool) {
        if done && !self.latched {
            debug!("Done latched ({})", self.destination);
        }
        self.latched |= done;
    }

    /// Observing domain edge. `source_level` is the latch value before any
    /// edge at this instant committed.
    pub fn observer_step(&mut self, source_level: bool) {
        if let Some(sync) = &mut self.sync {
            sync.step(source_level);
        }
    }

    /// Sequencer domain reset.
    pub fn reset_source(&mut self) {
        self.latched = false;
    }

    /// Observing domain reset.
    pub fn reset_observer(&mut self) {
        if let Some(sync) = &mut self.sync {
            sync.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_latch_is_sticky_until_reset() {
        let mut latch = DoneLatch::new(DoneDestination::Local);
        latch.latch_step(false);
        assert!(!latch.level());
        latch.latch_step(true);
        assert!(latch.level());
        latch.latch_step(false);
        assert!(latch.level());
        latch.reset_source();
        assert!(!latch.level());
    }

    #[test]
    fn resynchronized_latch_lags_two_observer_edges() {
        let mut latch = DoneLatch::new(DoneDestination::resynchronized("usb"));
        latch.latch_step(true);
        assert!(latch.source_level());
        assert!(!latch.level());

        latch.observer_step(latch.source_level());
        assert!(!latch.level());
        latch.observer_step(latch.source_level());
        assert!(latch.level());

        latch.reset_observer();
        assert!(!latch.level());
        assert!(latch.source_level());
    }

    #[test]
    fn local_ignores_observer_edges() {
        let mut latch = DoneLatch::new(DoneDestination::Local);
        latch.observer_step(true);
        assert!(!latch.level());
    }

    #[test]
    fn destination_domain() {
        let sync = DomainKey::new("sync");
        assert_eq!(DoneDestination::Local.domain(&sync).name(), "sync");
        let usb = DoneDestination::resynchronized("usb");
        assert_eq!(usb.domain(&sync).name(), "usb");
    }
}
