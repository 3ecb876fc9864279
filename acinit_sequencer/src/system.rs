//! Whole-system simulation: a board's clock tree driving the init block.
//!
//! [`InitSystem`] advances a [`ClockTree`] one instant at a time. At every
//! instant it first samples everything that crosses a domain boundary, then
//! commits the operating domain edge and the done observer edge, so that a
//! value produced by one domain is seen by another one edge later at the
//! earliest.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use acinit_clocking::{ClockTree, DomainAssembly, DomainKey, PllModel, Tick};
use acinit_common::{BoardPreset, ConfigError, InitProgram, Packet};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::SimError;
use crate::audio_init::AudioInit;
use crate::done::DoneDestination;
use crate::stream::{StreamBeat, StreamConsumer, TransactionCollector};

/// Domain the init block runs in unless configured otherwise.
pub const DEFAULT_OPERATING_DOMAIN: &str = "sync";

/// The raw start level as a function of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartStimulus {
    /// Never asserted.
    Low,
    /// Low before `at_ps`, high from then on.
    HeldFrom(u64),
    /// High during `at_ps..at_ps + width_ps`.
    Pulse {
        /// Rising edge.
        at_ps: u64,
        /// Time spent high.
        width_ps: u64,
    },
    /// Level changes as `(time_ps, level)`, in any order. Low before the earliest.
    Levels(Vec<(u64, bool)>),
}

impl Default for StartStimulus {
    fn default() -> Self {
        Self::HeldFrom(0)
    }
}

impl StartStimulus {
    /// Start rises at `at_ps` and stays high.
    #[must_use]
    pub const fn held_from(at_ps: u64) -> Self {
        Self::HeldFrom(at_ps)
    }

    /// Start is high for `width_ps` from `at_ps`.
    #[must_use]
    pub const fn pulse_at(at_ps: u64, width_ps: u64) -> Self {
        Self::Pulse { at_ps, width_ps }
    }

    /// Start follows `changes`, stored sorted by time.
    pub fn levels(changes: impl IntoIterator<Item = (u64, bool)>) -> Self {
        let mut changes: Vec<(u64, bool)> = changes.into_iter().collect();
        changes.sort_by_key(|&(time, _)| time);
        Self::Levels(changes)
    }

    /// The raw start level at `time_ps`.
    #[must_use]
    pub fn level_at(&self, time_ps: u64) -> bool {
        match self {
            Self::Low => false,
            Self::HeldFrom(at_ps) => time_ps >= *at_ps,
            Self::Pulse { at_ps, width_ps } => {
                (*at_ps..at_ps.saturating_add(*width_ps)).contains(&time_ps)
            }
            // The latest change at or before `time_ps` wins; for equal times the
            // one listed last does.
            Self::Levels(changes) => changes
                .iter()
                .filter(|(at, _)| *at <= time_ps)
                .max_by_key(|(at, _)| *at)
                .is_some_and(|(_, level)| *level),
        }
    }
}

/// Everything needed to build an [`InitSystem`].
#[derive(Debug, Clone)]
pub struct InitSystemConfig {
    /// The clock tree.
    pub assembly: Arc<DomainAssembly>,
    /// The program to stream.
    pub program: InitProgram,
    /// Operating domain of the init block.
    pub domain: String,
    /// Where done is observed.
    pub done: DoneDestination,
    /// The raw start input.
    pub start: StartStimulus,
    /// Lock behavior overrides, by synthesizer name.
    pub lock_models: Vec<(String, PllModel)>,
}

impl InitSystemConfig {
    /// Runs `program` in [`DEFAULT_OPERATING_DOMAIN`], start high from time zero, done local.
    pub fn new(assembly: Arc<DomainAssembly>, program: InitProgram) -> Self {
        Self {
            assembly,
            program,
            domain: DEFAULT_OPERATING_DOMAIN.to_string(),
            done: DoneDestination::Local,
            start: StartStimulus::default(),
            lock_models: Vec::new(),
        }
    }

    /// Binds `program` to a board preset's clock tree.
    ///
    /// # Errors
    ///
    /// Returns the assembly error if the preset's clock tree does not validate.
    pub fn for_board(board: BoardPreset, program: InitProgram) -> Result<Self, ConfigError> {
        let assembly = DomainAssembly::from_board(&board.spec())?;
        Ok(Self::new(Arc::new(assembly), program))
    }

    /// Selects the operating domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Selects where done is observed.
    pub fn with_done_destination(mut self, done: DoneDestination) -> Self {
        self.done = done;
        self
    }

    /// Replaces the start stimulus.
    pub fn with_start(mut self, start: StartStimulus) -> Self {
        self.start = start;
        self
    }

    /// Replaces the lock behavior of `synth`.
    pub fn with_lock_model(mut self, synth: impl Into<String>, model: PllModel) -> Self {
        self.lock_models.push((synth.into(), model));
        self
    }

    /// Scripts a loss of lock on `synth` during `window`, keeping its configured lock time.
    pub fn with_dropout(self, synth: &str, window: Range<u64>) -> Self {
        let lock_time = self
            .assembly
            .synthesizer(synth)
            .map_or(0, |node| node.config.lock_time_ps);
        self.with_lock_model(synth, PllModel::new(lock_time).with_dropout(window))
    }
}

/// One accepted stream beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    /// Time of the accepting edge.
    pub time_ps: u64,
    /// Operating domain cycle of the accepting edge.
    pub cycle: u64,
    /// The byte.
    pub payload: u8,
    /// Set on the final byte of a packet.
    pub last: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Name of the clock tree.
    pub assembly: String,
    /// Name of the program.
    pub program: String,
    /// Operating domain.
    pub domain: DomainKey,
    /// Domain in which done was observed.
    pub done_domain: DomainKey,
    /// Time of the edge that acted on the start pulse.
    pub start_recognized_ps: Option<u64>,
    /// First instant at which done was visible in `done_domain`.
    pub done_ps: u64,
    /// Cycle of `done_domain` whose edge made done visible.
    pub done_cycle: u64,
    /// Every accepted beat.
    pub transfers: Vec<TransferRecord>,
}

impl RunReport {
    /// The transfers regrouped into packets.
    #[must_use]
    pub fn collect(&self) -> TransactionCollector {
        collect_transfers(&self.transfers)
    }

    /// Number of accepted bytes.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.transfers.len()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} on {}: {} bytes in domain '{}'",
            self.program,
            self.assembly,
            self.bytes(),
            self.domain
        )?;
        if let Some(start) = self.start_recognized_ps {
            writeln!(f, "  start recognized at {start} ps")?;
        }
        writeln!(
            f,
            "  done in '{}' at {} ps (cycle {})",
            self.done_domain, self.done_ps, self.done_cycle
        )?;
        let collector = self.collect();
        let packets = collector.packets();
        for (i, packet) in packets.iter().enumerate() {
            match packet.as_bus_write() {
                Some(write) => writeln!(f, "  {i:3}: {write}")?,
                None => writeln!(f, "  {i:3}: {packet}")?,
            }
        }
        Ok(())
    }
}

/// A clock tree, the init block in its operating domain, and a consumer.
#[derive(Debug)]
pub struct InitSystem<C: StreamConsumer> {
    tree: ClockTree,
    block: AudioInit,
    consumer: C,
    start: StartStimulus,
    observer: Option<DomainKey>,
    transfers: Vec<TransferRecord>,
    start_recognized_ps: Option<u64>,
    done_at: Option<(u64, u64)>,
}

impl<C: StreamConsumer> InitSystem<C> {
    /// Powers up the system described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDomain`] if the operating or done domain
    /// does not exist, and [`ConfigError::UnknownSynthesizer`] for a lock
    /// model override naming a missing synthesizer.
    pub fn new(config: InitSystemConfig, consumer: C) -> Result<Self, SimError> {
        let operating = config.assembly.require_domain(&config.domain)?.key.clone();
        let observer = match &config.done {
            DoneDestination::Local => None,
            DoneDestination::Resynchronized { domain } => {
                config.assembly.require_domain(domain.name())?;
                Some(domain.clone())
            }
        };

        info!(
            "Init system on '{}': program '{}' ({} packets) in domain '{}', done {}",
            config.assembly.name(),
            config.program.name,
            config.program.packets.len(),
            config.domain,
            config.done
        );

        let mut tree = ClockTree::new(config.assembly);
        for (synth, model) in config.lock_models {
            tree.set_lock_model(&synth, Box::new(model))?;
        }

        let block = AudioInit::new(operating, &config.program, config.done);

        Ok(Self {
            tree,
            block,
            consumer,
            start: config.start,
            observer,
            transfers: Vec::new(),
            start_recognized_ps: None,
            done_at: None,
        })
    }

    /// The clock tree runtime.
    #[must_use]
    pub fn tree(&self) -> &ClockTree {
        &self.tree
    }

    /// The init block.
    #[must_use]
    pub fn block(&self) -> &AudioInit {
        &self.block
    }

    /// The stream consumer.
    #[must_use]
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Gives back the consumer.
    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Every beat accepted so far, across resets.
    #[must_use]
    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }

    /// Latched done level in its destination domain.
    #[must_use]
    pub fn done(&self) -> bool {
        self.block.done()
    }

    /// Advances to the next clock edge instant.
    pub fn step(&mut self) -> Tick {
        let tick = self.tree.advance();
        let now_ps = tick.time_ps;
        let source_level = self.block.latch().source_level();

        if let Some(edge) = tick.edge(self.block.domain().name()) {
            let (cycle, in_reset) = (edge.cycle, edge.in_reset);
            if !in_reset && self.block.start_pulse() {
                info!(
                    "Start recognized in '{}' at {} ps (cycle {})",
                    self.block.domain(),
                    now_ps,
                    cycle
                );
                if self.start_recognized_ps.is_none() {
                    self.start_recognized_ps = Some(now_ps);
                }
            }

            let start = self.start.level_at(now_ps);
            let ready = self.consumer.ready();
            let transfer = self.block.step(start, ready, in_reset);
            self.consumer.step(transfer);

            if let Some(beat) = transfer {
                self.transfers.push(TransferRecord {
                    time_ps: now_ps,
                    cycle,
                    payload: beat.payload,
                    last: beat.last,
                });
            }
        }

        if let Some(edge) = self.observer.as_ref().and_then(|o| tick.edge(o.name())) {
            self.block.observer_step(source_level, edge.in_reset);
        }

        match (self.done_at, self.block.done()) {
            (None, true) => {
                let cycle = self
                    .tree
                    .cycles(self.block.done_domain().name())
                    .unwrap_or(0)
                    .saturating_sub(1);
                info!(
                    "Done visible in '{}' at {} ps (cycle {})",
                    self.block.done_domain(),
                    now_ps,
                    cycle
                );
                self.done_at = Some((now_ps, cycle));
            }
            (Some(_), false) => {
                debug!("Done cleared by reset at {} ps", now_ps);
                self.done_at = None;
            }
            _ => {}
        }

        tick
    }

    /// Steps until the clock tree reaches `time_ps`.
    pub fn run_until(&mut self, time_ps: u64) {
        while self.tree.now_ps() < time_ps {
            self.step();
        }
    }

    /// Steps until done is visible, giving up after `max_cycles` operating
    /// domain cycles.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Timeout`] if done is not visible in time, typically
    /// because the consumer never accepts or the start edge never arrives.
    pub fn run_until_done(&mut self, max_cycles: u64) -> Result<RunReport, SimError> {
        let domain = self.block.domain().name().to_string();
        let first_cycle = self.tree.cycles(&domain).unwrap_or(0);

        loop {
            if let Some(report) = self.report() {
                return Ok(report);
            }
            let elapsed = self.tree.cycles(&domain).unwrap_or(0) - first_cycle;
            if elapsed >= max_cycles {
                return Err(SimError::Timeout {
                    domain,
                    cycles: elapsed,
                    bytes: self.transfers.len(),
                });
            }
            self.step();
        }
    }

    /// The report of the current run, once done is visible.
    #[must_use]
    pub fn report(&self) -> Option<RunReport> {
        let (done_ps, done_cycle) = self.done_at?;
        Some(RunReport {
            assembly: self.tree.assembly().name().to_string(),
            program: self.block.program_name().to_string(),
            domain: self.block.domain().clone(),
            done_domain: self.block.done_domain().clone(),
            start_recognized_ps: self.start_recognized_ps,
            done_ps,
            done_cycle,
            transfers: self.transfers.clone(),
        })
    }

    /// Accepted packets rendered one per line, for logs and the CLI.
    #[must_use]
    pub fn packet_summary(&self) -> String {
        collect_transfers(&self.transfers)
            .packets()
            .iter()
            .map(Packet::to_string)
            .join("\n")
    }
}

fn collect_transfers(transfers: &[TransferRecord]) -> TransactionCollector {
    let mut collector = TransactionCollector::new();
    for t in transfers {
        collector.push(StreamBeat {
            payload: t.payload,
            last: t.last,
        });
    }
    collector
}
