//! The packet list streamer.
//!
//! Walks an immutable [`PacketList`] once per reset, presenting one byte per
//! cycle on a ready/valid stream and flagging the final byte of every packet.
//! The position only moves on an edge where the consumer accepts the byte
//! on offer, so back-pressure can stall the walk for any number of cycles
//! without losing or repeating a byte.

use acinit_common::PacketList;
use contracts::*;
use tracing::{debug, info, trace};

use crate::stream::StreamBeat;

/// Where the streamer is in its single pass over the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamerState {
    /// Waiting for a start pulse.
    #[default]
    Idle,
    /// Offering byte `byte` of packet `packet`.
    Sending {
        /// Index into the packet list.
        packet: usize,
        /// Index into that packet.
        byte: usize,
    },
    /// Every byte has been accepted. Only a reset leaves this state.
    Complete,
}

/// What the streamer presents during the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamerOutputs {
    /// The beat on offer; `Some` is the stream's `valid`.
    pub beat: Option<StreamBeat>,
    /// Completion, combinational from state and the start pulse.
    pub done: bool,
}

/// Sequencer that streams a packet list after a start pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketListStreamer {
    packets: PacketList,
    state: StreamerState,
}

impl PacketListStreamer {
    /// An idle streamer over `packets`.
    #[must_use]
    pub fn new(packets: PacketList) -> Self {
        Self {
            packets,
            state: StreamerState::Idle,
        }
    }

    /// The list being streamed.
    #[must_use]
    pub fn packets(&self) -> &PacketList {
        &self.packets
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> StreamerState {
        self.state
    }

    /// Combinational outputs for the current cycle, given this cycle's start pulse.
    ///
    /// `done` follows the state, except that an empty list completes in the
    /// very cycle the start pulse is recognized.
    #[must_use]
    pub fn outputs(&self, start: bool) -> StreamerOutputs {
        match self.state {
            StreamerState::Idle => StreamerOutputs {
                beat: None,
                done: start && self.packets.is_empty(),
            },
            StreamerState::Sending { packet, byte } => StreamerOutputs {
                beat: self.beat_at(packet, byte),
                done: false,
            },
            StreamerState::Complete => StreamerOutputs {
                beat: None,
                done: true,
            },
        }
    }

    fn beat_at(&self, packet: usize, byte: usize) -> Option<StreamBeat> {
        let p = self.packets.get(packet)?;
        Some(StreamBeat {
            payload: p.get(byte)?,
            last: byte + 1 == p.len(),
        })
    }

    /// One clock edge. Returns the beat transferred on this edge.
    #[debug_ensures(ret.is_none() || ready)]
    #[debug_ensures(old(self.state) == StreamerState::Complete -> self.state == StreamerState::Complete)]
    pub fn step(&mut self, start: bool, ready: bool) -> Option<StreamBeat> {
        match self.state {
            StreamerState::Idle => {
                if start {
                    if self.packets.is_empty() {
                        info!("Start recognized with an empty packet list; complete");
                        self.state = StreamerState::Complete;
                    } else {
                        debug!(
                            "Start recognized; streaming {} packets ({} bytes)",
                            self.packets.len(),
                            self.packets.total_bytes()
                        );
                        self.state = StreamerState::Sending { packet: 0, byte: 0 };
                    }
                }
                None
            }
            StreamerState::Sending { packet, byte } => {
                if !ready {
                    return None;
                }
                let beat = self.beat_at(packet, byte)?;
                trace!("Packet {} byte {}: {}", packet, byte, beat);
                self.state = if !beat.last {
                    StreamerState::Sending {
                        packet,
                        byte: byte + 1,
                    }
                } else if packet + 1 < self.packets.len() {
                    debug!("Packet {} accepted", packet);
                    StreamerState::Sending {
                        packet: packet + 1,
                        byte: 0,
                    }
                } else {
                    info!("Packet list complete after {} packets", self.packets.len());
                    StreamerState::Complete
                };
                Some(beat)
            }
            StreamerState::Complete => None,
        }
    }

    /// Domain reset: back to `Idle`, ready for another run.
    #[ensures(self.state == StreamerState::Idle)]
    pub fn reset(&mut self) {
        self.state = StreamerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    fn two_writes() -> PacketList {
        PacketList::new(vec![vec![0x30u8, 0x00, 0x00], vec![0x30, 0x01, 0x01]]).unwrap()
    }

    /// Drives the streamer for `cycles` edges with a single start pulse on cycle 0.
    /// Returns (cycle, beat) transfers and the done level of every cycle.
    fn drive(
        streamer: &mut PacketListStreamer,
        cycles: usize,
        ready: impl Fn(usize) -> bool,
    ) -> (Vec<(usize, StreamBeat)>, Vec<bool>) {
        let mut transfers = Vec::new();
        let mut done = Vec::new();
        for cycle in 0..cycles {
            let start = cycle == 0;
            done.push(streamer.outputs(start).done);
            if let Some(beat) = streamer.step(start, ready(cycle)) {
                transfers.push((cycle, beat));
            }
        }
        (transfers, done)
    }

    #[test]
    fn streams_two_writes_in_order() {
        let mut streamer = PacketListStreamer::new(two_writes());
        let (transfers, done) = drive(&mut streamer, 10, |_| true);

        let bytes: Vec<u8> = transfers.iter().map(|(_, b)| b.payload).collect();
        assert_eq!(bytes, vec![0x30, 0x00, 0x00, 0x30, 0x01, 0x01]);
        let lasts: Vec<usize> = transfers
            .iter()
            .enumerate()
            .filter(|(_, (_, b))| b.last)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(lasts, vec![2, 5]);

        // Start on cycle 0, bytes on cycles 1..=6, done from cycle 7.
        let last_accept = transfers.last().unwrap().0;
        assert_eq!(last_accept, 6);
        assert!(done[..=last_accept].iter().all(|d| !d));
        assert!(done[last_accept + 1..].iter().all(|d| *d));
        assert_eq!(streamer.state(), StreamerState::Complete);
    }

    #[test]
    fn empty_list_is_done_with_the_pulse() {
        let mut streamer = PacketListStreamer::new(PacketList::empty());
        assert!(!streamer.outputs(false).done);
        assert!(streamer.outputs(true).done);
        let (transfers, done) = drive(&mut streamer, 4, |_| true);
        assert!(transfers.is_empty());
        assert_eq!(done, vec![true, true, true, true]);
    }

    #[test]
    fn waits_for_start() {
        let mut streamer = PacketListStreamer::new(two_writes());
        for _ in 0..5 {
            assert_eq!(streamer.outputs(false), StreamerOutputs::default());
            assert!(streamer.step(false, true).is_none());
        }
        assert_eq!(streamer.state(), StreamerState::Idle);
    }

    #[test]
    fn holds_byte_under_back_pressure() {
        let mut streamer = PacketListStreamer::new(two_writes());
        streamer.step(true, true);
        let offered = streamer.outputs(false).beat;
        for _ in 0..3 {
            assert!(streamer.step(false, false).is_none());
            assert_eq!(streamer.outputs(false).beat, offered);
        }
        assert_eq!(streamer.step(false, true), offered);
        assert_eq!(
            streamer.state(),
            StreamerState::Sending { packet: 0, byte: 1 }
        );
    }

    #[test]
    fn start_ignored_while_sending_and_complete() {
        let mut streamer = PacketListStreamer::new(two_writes());
        streamer.step(true, true);
        streamer.step(true, true);
        assert_eq!(
            streamer.state(),
            StreamerState::Sending { packet: 0, byte: 1 }
        );
        let (transfers, _) = drive(&mut streamer, 10, |_| true);
        // The pulse on cycle 0 of `drive` does not restart the walk.
        assert_eq!(transfers.len(), 5);
        assert!(streamer.step(true, true).is_none());
        assert_eq!(streamer.state(), StreamerState::Complete);
    }

    #[test]
    fn rearm_requires_reset() {
        let mut streamer = PacketListStreamer::new(two_writes());
        let (first, _) = drive(&mut streamer, 10, |_| true);
        let (none, done) = drive(&mut streamer, 10, |_| true);
        assert!(none.is_empty());
        assert!(done.iter().all(|d| *d));

        streamer.reset();
        assert!(!streamer.outputs(false).done);
        let (second, _) = drive(&mut streamer, 10, |_| true);
        assert_eq!(first, second);
    }

    #[test]
    fn variable_length_packets_mark_last() {
        let list = PacketList::new(vec![vec![1u8], vec![2, 3, 4]]).unwrap();
        let mut streamer = PacketListStreamer::new(list);
        let (transfers, _) = drive(&mut streamer, 8, |_| true);
        let lasts: Vec<bool> = transfers.iter().map(|(_, b)| b.last).collect();
        assert_eq!(lasts, vec![true, false, false, true]);
    }

    #[test]
    fn fidelity_under_random_back_pressure() {
        fn property(packets: Vec<Vec<u8>>, ready: Vec<bool>) -> TestResult {
            let packets = packets.into_iter().filter(|p| !p.is_empty());
            let Ok(list) = PacketList::new(packets) else {
                return TestResult::failed();
            };
            if ready.iter().all(|r| !r) {
                return TestResult::discard();
            }
            let mut streamer = PacketListStreamer::new(list.clone());
            let budget = 1 + list.total_bytes() * ready.len() + ready.len();
            let (transfers, done) = drive(&mut streamer, budget, |c| ready[c % ready.len()]);

            let bytes: Vec<u8> = transfers.iter().map(|(_, b)| b.payload).collect();
            let lasts: Vec<usize> = transfers
                .iter()
                .enumerate()
                .filter(|(_, (_, b))| b.last)
                .map(|(i, _)| i)
                .collect();
            let accepted_only_when_ready = transfers.iter().all(|(c, _)| ready[c % ready.len()]);
            let done_is_monotonic = done.windows(2).all(|w| !w[0] || w[1]);

            TestResult::from_bool(
                bytes == list.flatten()
                    && lasts == list.last_byte_positions()
                    && accepted_only_when_ready
                    && done_is_monotonic
                    && done.last().copied().unwrap_or(false),
            )
        }

        QuickCheck::new()
            .tests(200)
            .quickcheck(property as fn(Vec<Vec<u8>>, Vec<bool>) -> TestResult);
    }
}
