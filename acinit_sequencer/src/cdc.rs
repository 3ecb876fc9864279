//! Clock domain crossing primitives.
//!
//! A single-bit signal enters a domain only through an [`FfSynchronizer`]:
//! a chain of flip-flops clocked by the destination domain. [`StartTrigger`]
//! stacks a [`RisingEdgeDetector`] on top, turning an asynchronous start
//! level into a one-cycle pulse that belongs to the destination domain.

use contracts::*;

/// Number of flip-flops used by [`StartTrigger::new`] and resynchronized done latches.
pub const DEFAULT_SYNC_STAGES: usize = 2;

/// A multi-stage flip-flop synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfSynchronizer {
    stages: Vec<bool>,
}

impl FfSynchronizer {
    /// A chain of `stages` flip-flops, all low.
    #[requires(stages >= 2)]
    #[ensures(!ret.output())]
    pub fn new(stages: usize) -> Self {
        Self {
            stages: vec![false; stages],
        }
    }

    /// Number of flip-flops.
    #[must_use]
    pub fn stages(&self) -> usize {
        self.stages.len()
    }

    /// The synchronized level, valid in the destination domain.
    #[must_use]
    pub fn output(&self) -> bool {
        self.stages.last().copied().unwrap_or(false)
    }

    /// One destination edge sampling `input`.
    pub fn step(&mut self, input: bool) {
        self.stages.rotate_right(1);
        self.stages[0] = input;
    }

    /// Clears every stage.
    #[ensures(!self.output())]
    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(|s| *s = false);
    }
}

/// Detects a 0 to 1 transition against the previous cycle's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RisingEdgeDetector {
    previous: bool,
}

impl RisingEdgeDetector {
    /// A detector whose previous value is low.
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: false }
    }

    /// Whether `current` is a rise against the previous cycle.
    #[must_use]
    pub const fn pulse(&self, current: bool) -> bool {
        current && !self.previous
    }

    /// Registers `current` as the previous value.
    pub fn step(&mut self, current: bool) {
        self.previous = current;
    }

    /// Forgets the previous value.
    pub fn reset(&mut self) {
        self.previous = false;
    }
}

/// Start signal crossing: synchronizer followed by an edge detector.
///
/// A level that rises before destination edge `k` is sampled at `k`, leaves
/// the synchronizer after edge `k + 1`, and is visible as [`Self::pulse`]
/// for exactly one cycle, so the sequencer acts on it at edge `k + 2`.
/// A level that is high for less than one destination period may fall
/// between two edges and never be seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTrigger {
    sync: FfSynchronizer,
    edge: RisingEdgeDetector,
}

impl Default for StartTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl StartTrigger {
    /// A trigger with [`DEFAULT_SYNC_STAGES`] flip-flops.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stages(DEFAULT_SYNC_STAGES)
    }

    /// A trigger with a deeper synchronizer.
    #[requires(stages >= 2)]
    pub fn with_stages(stages: usize) -> Self {
        Self {
            sync: FfSynchronizer::new(stages),
            edge: RisingEdgeDetector::new(),
        }
    }

    /// The one-cycle start pulse presented during the current cycle.
    #[must_use]
    pub fn pulse(&self) -> bool {
        self.edge.pulse(self.sync.output())
    }

    /// The synchronized start level.
    #[must_use]
    pub fn level(&self) -> bool {
        self.sync.output()
    }

    /// One destination edge sampling the raw start level.
    pub fn step(&mut self, start: bool) {
        self.edge.step(self.sync.output());
        self.sync.step(start);
    }

    /// Returns to power-on state.
    pub fn reset(&mut self) {
        self.sync.reset();
        self.edge.reset();
    }
}
