//! Named initialization programs.
//!
//! Several alternative init sequences exist for the same codec. They are kept
//! as selectable, named [`InitProgram`]s fed to a single sequencer rather than
//! as separate sequencer implementations. Programs can also be loaded from a
//! JSON file of the form `{"name": "...", "packets": [[48, 0, 0], ...]}`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, PacketList};

/// I2C address byte of the codec as it appears on the wire.
pub const CODEC_BUS_ADDRESS: u8 = 0x30;

/// A named, immutable packet program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InitProgram {
    /// Name used to select the program.
    pub name: String,
    /// Free-form description, empty if not given.
    #[serde(default)]
    pub description: String,
    /// Packets streamed in order.
    pub packets: PacketList,
}

impl InitProgram {
    /// A program without a description.
    pub fn new(name: impl Into<String>, packets: PacketList) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            packets,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Looks up one of the built-in programs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProgram`] if no built-in has that name.
    pub fn builtin(name: &str) -> Result<&'static Self, ConfigError> {
        BUILTIN_PROGRAMS
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProgram(name.to_string()))
    }

    /// Names of all built-in programs, in declaration order.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_PROGRAMS.keys().copied()
    }

    /// All built-in programs, in declaration order.
    pub fn builtins() -> impl Iterator<Item = &'static Self> {
        BUILTIN_PROGRAMS.values()
    }

    /// Parses a program from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the text is malformed or contains an
    /// empty packet; `origin` names the source in the error.
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads a program from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Json`] if its contents are not a valid program.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Self::from_json_str(&text, path)?;
        tracing::debug!(
            "Loaded program '{}' ({} packets) from {}",
            program.name,
            program.packets.len(),
            path.display()
        );
        Ok(program)
    }

    /// Serializes the program to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds a program of `{address, register, value}` writes to the codec.
fn codec_writes(writes: &[(u8, u8)]) -> Result<PacketList, ConfigError> {
    PacketList::new(
        writes
            .iter()
            .map(|&(register, value)| vec![CODEC_BUS_ADDRESS, register, value]),
    )
}

/// DAC playback bring-up for a TLV320AIC3100 class codec.
///
/// Assumes AVdd = DVdd = 1.8 V, MCLK = 12.288 MHz, 47 uF headphone coupling,
/// codec PLL disabled and DOSR 128.
const TLV320_DAC_WRITES: &[(u8, u8)] = &[
    // page 0
    (0x00, 0x00),
    // software reset
    (0x01, 0x01),
    // NDAC = 1, powered
    (0x0b, 0x81),
    // MDAC = 2, powered
    (0x0c, 0x82),
    // DOSR = 128
    (0x0d, 0x00),
    (0x0e, 0x80),
    // 20 bit word length
    (0x1b, 0x10),
    // DAC processing block PRB_P8
    (0x3c, 0x08),
    // page 1
    (0x00, 0x01),
    // disable crude AVdd with external supply
    (0x01, 0x08),
    // master analog power control
    (0x02, 0x00),
    // REF charging time 40 ms
    (0x7b, 0x01),
    // headphone soft stepping: Rpop 6k, N = 6, 20 us steps
    (0x14, 0x25),
    // input and headphone output common mode 0.9 V
    (0x0a, 0x00),
    // left DAC to HPL
    (0x0c, 0x08),
    // right DAC to HPR
    (0x0d, 0x08),
    // DAC PTM_P3/4
    (0x03, 0x00),
    (0x04, 0x00),
    // HPL and HPR gain 0 dB
    (0x10, 0x00),
    (0x11, 0x00),
    // power up HPL and HPR
    (0x09, 0x30),
    // page 0
    (0x00, 0x00),
    // power up both DAC channels, left data to left, right to right
    (0x3f, 0xd6),
    // unmute DAC digital volume
    (0x40, 0x00),
];

const TLV320_SOFT_RESET_WRITES: &[(u8, u8)] = &[(0x00, 0x00), (0x01, 0x01)];

/// The built-in program table, in listing order.
fn builtin_programs() -> Result<IndexMap<&'static str, InitProgram>, ConfigError> {
    let mut programs = IndexMap::new();
    programs.insert(
        "tlv320aic3100-dac",
        InitProgram::new("tlv320aic3100-dac", codec_writes(TLV320_DAC_WRITES)?)
            .with_description("DAC and headphone driver bring-up, 12.288 MHz MCLK, codec PLL off"),
    );
    programs.insert(
        "tlv320aic3100-soft-reset",
        InitProgram::new(
            "tlv320aic3100-soft-reset",
            codec_writes(TLV320_SOFT_RESET_WRITES)?,
        )
        .with_description("Select page 0 and issue a software reset"),
    );
    programs.insert(
        "none",
        InitProgram::new("none", PacketList::empty())
            .with_description("Empty program; completes immediately"),
    );
    Ok(programs)
}

lazy_static::lazy_static! {
    static ref BUILTIN_PROGRAMS: IndexMap<&'static str, InitProgram> =
        builtin_programs().expect("Built-in program tables must only hold non-empty packets");
}
