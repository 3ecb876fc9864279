//! The ready/valid byte stream and its consumers.
//!
//! A byte moves from producer to consumer on a clock edge where the producer
//! presents a beat (`valid`) and the consumer is `ready`. Neither side may
//! change its mind about that beat afterwards: the producer keeps presenting
//! the same beat until it is accepted, and the consumer sees every accepted
//! beat exactly once through [`StreamConsumer::step`].

use std::fmt;
use std::mem;
use std::str::FromStr;

use acinit_common::{BusWrite, Packet};
use itertools::Itertools;

use crate::SimError;

/// One byte on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamBeat {
    /// The byte.
    pub payload: u8,
    /// Set on the final byte of a packet.
    pub last: bool,
}

impl fmt::Display for StreamBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.payload)?;
        if self.last {
            write!(f, " (last)")?;
        }
        Ok(())
    }
}

/// The receiving side of a byte stream, clocked in the producer's domain.
pub trait StreamConsumer: fmt::Debug + Send {
    /// Ready level during the current cycle.
    ///
    /// Must not depend on whether the producer is presenting a beat.
    fn ready(&self) -> bool;

    /// One clock edge. `transfer` is the beat accepted on this edge, if any.
    fn step(&mut self, transfer: Option<StreamBeat>);
}

/// Cycle-indexed ready behavior for test and demo consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadyPattern {
    /// Ready on every cycle.
    #[default]
    Always,
    /// Never ready.
    Never,
    /// Ready on cycle 0 and every `n`-th cycle after it.
    EveryNth(u32),
    /// Not ready for the first `n` cycles, then always.
    After(u64),
    /// Repeats the listed levels.
    Cyclic(Vec<bool>),
}

impl ReadyPattern {
    /// Ready level during `cycle`.
    #[must_use]
    pub fn ready_at(&self, cycle: u64) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::EveryNth(n) => cycle % u64::from((*n).max(1)) == 0,
            Self::After(n) => cycle >= *n,
            Self::Cyclic(levels) => {
                if levels.is_empty() {
                    return true;
                }
                levels[(cycle % levels.len() as u64) as usize]
            }
        }
    }
}

impl fmt::Display for ReadyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
            Self::EveryNth(n) => write!(f, "every:{n}"),
            Self::After(n) => write!(f, "after:{n}"),
            Self::Cyclic(levels) => write!(
                f,
                "cycle:{}",
                levels.iter().map(|&r| if r { '1' } else { '0' }).join("")
            ),
        }
    }
}

impl FromStr for ReadyPattern {
    type Err = SimError;

    /// Parses `always`, `never`, `every:N`, `after:N` or `cycle:0110`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SimError::InvalidReadyPattern {
            pattern: s.to_string(),
            reason: reason.to_string(),
        };

        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        match (kind, arg) {
            ("always", None) => Ok(Self::Always),
            ("never", None) => Ok(Self::Never),
            ("every", Some(n)) => match n.parse::<u32>() {
                Ok(0) => Err(invalid("period must be at least 1")),
                Ok(n) => Ok(Self::EveryNth(n)),
                Err(e) => Err(invalid(&e.to_string())),
            },
            ("after", Some(n)) => n
                .parse::<u64>()
                .map(Self::After)
                .map_err(|e| invalid(&e.to_string())),
            ("cycle", Some(bits)) => {
                if bits.is_empty() {
                    return Err(invalid("empty cycle"));
                }
                bits.chars()
                    .map(|c| match c {
                        '0' => Ok(false),
                        '1' => Ok(true),
                        _ => Err(invalid("cycle may only contain '0' and '1'")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Cyclic)
            }
            _ => Err(invalid(
                "expected always, never, every:N, after:N or cycle:BITS",
            )),
        }
    }
}

/// Regroups accepted beats into packets using the `last` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionCollector {
    packets: Vec<Packet>,
    pending: Vec<u8>,
}

impl TransactionCollector {
    /// A collector with nothing received.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one accepted beat. Returns the packet it completed, if any.
    pub fn push(&mut self, beat: StreamBeat) -> Option<&Packet> {
        self.pending.push(beat.payload);
        if !beat.last {
            return None;
        }
        let packet = Packet::new(mem::take(&mut self.pending))?;
        self.packets.push(packet);
        self.packets.last()
    }

    /// Packets completed so far, in arrival order.
    #[must_use]
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Bytes received since the last `last` marker.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Every byte received, completed packets first.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.packets
            .iter()
            .flat_map(|p| p.bytes().iter().copied())
            .chain(self.pending.iter().copied())
            .collect()
    }

    /// Completed three-byte packets read as register writes.
    pub fn bus_writes(&self) -> impl Iterator<Item = BusWrite> + '_ {
        self.packets.iter().filter_map(Packet::as_bus_write)
    }
}

/// A consumer whose ready level follows a [`ReadyPattern`] and which keeps
/// everything it accepts.
#[derive(Debug, Clone, Default)]
pub struct PatternedConsumer {
    pattern: ReadyPattern,
    cycle: u64,
    accepted: Vec<StreamBeat>,
    collector: TransactionCollector,
}

impl PatternedConsumer {
    /// A consumer following `pattern` from cycle 0.
    #[must_use]
    pub fn new(pattern: ReadyPattern) -> Self {
        Self {
            pattern,
            ..Default::default()
        }
    }

    /// A consumer that never applies back-pressure.
    #[must_use]
    pub fn always_ready() -> Self {
        Self::new(ReadyPattern::Always)
    }

    /// The ready behavior.
    #[must_use]
    pub fn pattern(&self) -> &ReadyPattern {
        &self.pattern
    }

    /// Edges seen so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Every accepted beat in acceptance order.
    #[must_use]
    pub fn accepted(&self) -> &[StreamBeat] {
        &self.accepted
    }

    /// Accepted beats regrouped into packets.
    #[must_use]
    pub fn collector(&self) -> &TransactionCollector {
        &self.collector
    }
}

impl StreamConsumer for PatternedConsumer {
    fn ready(&self) -> bool {
        self.pattern.ready_at(self.cycle)
    }

    fn step(&mut self, transfer: Option<StreamBeat>) {
        if let Some(beat) = transfer {
            self.accepted.push(beat);
            self.collector.push(beat);
        }
        self.cycle += 1;
    }
}
