//! Packets and packet lists.
//!
//! A [`Packet`] is one control-bus transaction as an opaque byte sequence. A
//! [`PacketList`] is the ordered, immutable program that the sequencer walks.
//! Both are validated on construction: a packet can never be empty, so the
//! "last byte" marker always has a byte to sit on.

use std::fmt;
use std::sync::Arc;

use contracts::*;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A single non-empty bus transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    bytes: Box<[u8]>,
}

impl Packet {
    /// Creates a packet, or `None` if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// The packet payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes in the packet. Never zero.
    #[must_use]
    #[ensures(ret > 0)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `offset`, if in range.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    /// Interprets a three byte packet as an addressed register write.
    #[must_use]
    pub fn as_bus_write(&self) -> Option<BusWrite> {
        match *self.bytes {
            [address, register, value] => Some(BusWrite {
                address,
                register,
                value,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02x}")?;
        }
        write!(f, "]")
    }
}

/// The `{bus address, register, value}` shape used by codec register pokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusWrite {
    /// Bus (device) address byte as sent on the wire.
    pub address: u8,
    /// Register index within the current page.
    pub register: u8,
    /// Value written to the register.
    pub value: u8,
}

impl fmt::Display for BusWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dev 0x{:02x} reg 0x{:02x} <= 0x{:02x}",
            self.address, self.register, self.value
        )
    }
}

/// An ordered, immutable list of packets.
///
/// Cloning is cheap: the packets live behind an `Arc` and are shared between
/// every clone. There is no way to mutate a list after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct PacketList {
    packets: Arc<[Packet]>,
}

impl PacketList {
    /// Builds a packet list, rejecting any zero-length packet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPacket`] naming the first empty packet.
    pub fn new<I, P>(packets: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let packets = packets
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| Packet::new(bytes).ok_or(ConfigError::EmptyPacket { index }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            packets: packets.into(),
        })
    }

    /// A list with no packets. Running it completes without emitting a byte.
    #[must_use]
    #[ensures(ret.is_empty())]
    pub fn empty() -> Self {
        Self {
            packets: Arc::from(Vec::new()),
        }
    }

    /// Number of packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the list has no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packet at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Packet> {
        self.packets.get(index)
    }

    /// Iterates packets in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter()
    }

    /// Total number of bytes across all packets.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.packets.iter().map(Packet::len).sum()
    }

    /// All bytes of all packets, concatenated in list order.
    #[must_use]
    #[ensures(ret.len() == self.total_bytes())]
    pub fn flatten(&self) -> Vec<u8> {
        self.packets
            .iter()
            .flat_map(|p| p.bytes().iter().copied())
            .collect()
    }

    /// Positions in [`Self::flatten`] that carry the last byte of a packet.
    #[must_use]
    #[ensures(ret.len() == self.len())]
    pub fn last_byte_positions(&self) -> Vec<usize> {
        let mut position = 0;
        self.packets
            .iter()
            .map(|p| {
                position += p.len();
                position - 1
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a PacketList {
    type Item = &'a Packet;
    type IntoIter = std::slice::Iter<'a, Packet>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

impl TryFrom<Vec<Vec<u8>>> for PacketList {
    type Error = ConfigError;

    fn try_from(value: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PacketList> for Vec<Vec<u8>> {
    fn from(list: PacketList) -> Self {
        list.packets.iter().map(|p| p.bytes().to_vec()).collect()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::quickcheck;

    quickcheck! {
        fn prop_last_positions_partition_flattened_bytes(raw: Vec<Vec<u8>>) -> bool {
            let raw: Vec<Vec<u8>> = raw.into_iter().filter(|p| !p.is_empty()).collect();
            let list = PacketList::new(raw.clone()).unwrap();
            let positions = list.last_byte_positions();
            let mut start = 0;
            raw.iter().zip(positions.iter()).all(|(packet, &last)| {
                let ok = last + 1 - start == packet.len();
                start = last + 1;
                ok
            }) && start == list.flatten().len()
        }

        fn prop_any_empty_packet_is_rejected(raw: Vec<Vec<u8>>, at: usize) -> bool {
            let mut raw = raw;
            let index = if raw.is_empty() { 0 } else { at % (raw.len() + 1) };
            raw.insert(index, Vec::new());
            let first_empty = raw.iter().position(Vec::is_empty).unwrap();
            matches!(
                PacketList::new(raw),
                Err(ConfigError::EmptyPacket { index }) if index == first_empty
            )
        }
    }
}
