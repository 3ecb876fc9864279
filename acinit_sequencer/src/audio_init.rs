//! The codec init block: start crossing, streamer and done latch in one
//! operating domain.

use acinit_clocking::DomainKey;
use acinit_common::InitProgram;

use crate::cdc::StartTrigger;
use crate::done::{DoneDestination, DoneLatch};
use crate::stream::StreamBeat;
use crate::streamer::{PacketListStreamer, StreamerOutputs, StreamerState};

/// Streams one [`InitProgram`] after a start edge and latches completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInit {
    domain: DomainKey,
    program_name: String,
    trigger: StartTrigger,
    streamer: PacketListStreamer,
    done: DoneLatch,
}

impl AudioInit {
    /// An init block for `program` in `domain`, powered up idle.
    #[must_use]
    pub fn new(domain: DomainKey, program: &InitProgram, destination: DoneDestination) -> Self {
        Self {
            domain,
            program_name: program.name.clone(),
            trigger: StartTrigger::new(),
            streamer: PacketListStreamer::new(program.packets.clone()),
            done: DoneLatch::new(destination),
        }
    }

    /// The operating domain.
    #[must_use]
    pub fn domain(&self) -> &DomainKey {
        &self.domain
    }

    /// The domain in which [`Self::done`] is valid.
    #[must_use]
    pub fn done_domain(&self) -> &DomainKey {
        self.done.destination().domain(&self.domain)
    }

    /// Name of the program being streamed.
    #[must_use]
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// The start crossing.
    #[must_use]
    pub fn trigger(&self) -> &StartTrigger {
        &self.trigger
    }

    /// The streamer.
    #[must_use]
    pub fn streamer(&self) -> &PacketListStreamer {
        &self.streamer
    }

    /// The done latch.
    #[must_use]
    pub fn latch(&self) -> &DoneLatch {
        &self.done
    }

    /// Streamer state.
    #[must_use]
    pub fn state(&self) -> StreamerState {
        self.streamer.state()
    }

    /// What the block presents to the stream during the current cycle.
    #[must_use]
    pub fn outputs(&self) -> StreamerOutputs {
        self.streamer.outputs(self.trigger.pulse())
    }

    /// Start pulse presented during the current cycle.
    #[must_use]
    pub fn start_pulse(&self) -> bool {
        self.trigger.pulse()
    }

    /// The latched done level in its destination domain.
    #[must_use]
    pub fn done(&self) -> bool {
        self.done.level()
    }

    /// One operating domain edge.
    ///
    /// `start` is the raw, unsynchronized start level sampled at this edge;
    /// `ready` is the consumer's ready level for the cycle this edge closes;
    /// `in_reset` is the domain reset level for that cycle. Returns the beat
    /// transferred on this edge.
    pub fn step(&mut self, start: bool, ready: bool, in_reset: bool) -> Option<StreamBeat> {
        if in_reset {
            self.trigger.reset();
            self.streamer.reset();
            self.done.reset_source();
            return None;
        }

        let pulse = self.trigger.pulse();
        let done = self.streamer.outputs(pulse).done;
        let transfer = self.streamer.step(pulse, ready);
        self.done.latch_step(done);
        self.trigger.step(start);
        transfer
    }

    /// One edge of the done observer's domain, when it is resynchronized.
    ///
    /// `source_level` is [`DoneLatch::source_level`] sampled before any edge at
    /// this instant committed.
    pub fn observer_step(&mut self, source_level: bool, in_reset: bool) {
        if in_reset {
            self.done.reset_observer();
        } else {
            self.done.observer_step(source_level);
        }
    }
}
