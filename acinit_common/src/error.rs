//! Configuration errors shared by every crate in the workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating configuration.
///
/// None of these can occur once a design is running: every constructor that
/// accepts user-provided configuration checks it up front and returns one of
/// these variants instead of producing a half-valid object.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A packet list entry without bytes.
    #[error("Packet {index} is empty; every packet must carry at least one byte")]
    EmptyPacket {
        /// Position of the packet in the list.
        index: usize,
    },

    /// A synthesizer without output counters.
    #[error("Synthesizer '{synth}' declares no output clocks")]
    NoOutputs {
        /// Synthesizer name.
        synth: String,
    },

    /// A multiply factor the device cannot produce.
    #[error("Synthesizer '{synth}' output {output}: multiply factor {value} outside 1..={max}")]
    MultiplyOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Output index.
        output: usize,
        /// Requested factor.
        value: u32,
        /// Device maximum.
        max: u32,
    },

    /// A divide factor the device cannot produce.
    #[error("Synthesizer '{synth}' output {output}: divide factor {value} outside 1..={max}")]
    DivideOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Output index.
        output: usize,
        /// Requested factor.
        value: u32,
        /// Device maximum.
        max: u32,
    },

    /// A duty cycle of 0% or 100% and beyond.
    #[error("Synthesizer '{synth}' output {output}: duty cycle {value}% outside 1..=99")]
    DutyCycleOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Output index.
        output: usize,
        /// Requested percentage.
        value: u8,
    },

    /// A phase shift of more than one output period in either direction.
    #[error(
        "Synthesizer '{synth}' output {output}: phase shift {phase_ps} ps exceeds output period {period_ps} ps"
    )]
    PhaseShiftOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Output index.
        output: usize,
        /// Requested shift.
        phase_ps: i64,
        /// Period of the output.
        period_ps: u64,
    },

    /// An input clock outside the device's lock range.
    #[error("Synthesizer '{synth}': input frequency {hz} Hz outside {min}..={max} Hz")]
    InputFrequencyOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Input frequency.
        hz: u64,
        /// Slowest usable input.
        min: u64,
        /// Fastest usable input.
        max: u64,
    },

    /// An output clock the counters cannot produce.
    #[error("Synthesizer '{synth}' output {output}: frequency {hz} Hz outside {min}..={max} Hz")]
    OutputFrequencyOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Output index.
        output: usize,
        /// Resulting frequency.
        hz: u64,
        /// Slowest output.
        min: u64,
        /// Fastest output.
        max: u64,
    },

    /// A reference clock declared with a zero period.
    #[error("Reference clock '{name}' has a zero period")]
    ZeroPeriod {
        /// Reference name.
        name: String,
    },

    /// A clock source naming a reference that does not exist.
    #[error("Unknown reference clock '{0}'")]
    UnknownReference(String),

    /// A clock source or lock gate naming a synthesizer that does not exist.
    #[error("Unknown synthesizer '{0}'")]
    UnknownSynthesizer(String),

    /// A domain lookup that found nothing.
    #[error("Unknown clock domain '{0}'")]
    UnknownDomain(String),

    /// A clock source selecting an output the synthesizer does not have.
    #[error("Synthesizer '{synth}' has {available} outputs, output {output} requested")]
    OutputIndexOutOfRange {
        /// Synthesizer name.
        synth: String,
        /// Requested output.
        output: usize,
        /// Number of configured outputs.
        available: usize,
    },

    /// A reference, synthesizer or domain declared without a name.
    #[error("A {kind} must have a non-empty name")]
    EmptyName {
        /// What was being declared.
        kind: &'static str,
    },

    /// A name used by two declarations.
    #[error("Name '{0}' is declared more than once")]
    DuplicateName(String),

    /// Cascaded synthesizers that feed back into themselves.
    #[error("Synthesizer chain through '{0}' feeds back into itself")]
    SynthesizerCycle(String),

    /// A clock tree without any domain to clock.
    #[error("Clock tree '{0}' declares no domains")]
    NoDomains(String),

    /// A reset synchronizer too short to release synchronously.
    #[error("Reset synchronizer for domain '{domain}' needs at least 2 stages, got {stages}")]
    TooFewResetStages {
        /// Domain name.
        domain: String,
        /// Requested depth.
        stages: usize,
    },

    /// A program name missing from the built-in table.
    #[error("Unknown init program '{0}'")]
    UnknownProgram(String),

    /// A board name without a preset.
    #[error("Unknown board '{0}'")]
    UnknownBoard(String),

    /// A program file that could not be read.
    #[error("Failed to read program file {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A program file that is not a valid program.
    #[error("Malformed program file {path}: {source}")]
    Json {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
}
