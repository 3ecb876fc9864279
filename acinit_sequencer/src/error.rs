//! Simulation errors.

use acinit_common::ConfigError;
use thiserror::Error;

/// Errors raised while setting up or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The system could not be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cycle budget ran out before done was observed.
    #[error(
        "No completion observed in domain '{domain}' within {cycles} cycles ({bytes} bytes accepted)"
    )]
    Timeout {
        /// Operating domain.
        domain: String,
        /// Operating domain cycles simulated.
        cycles: u64,
        /// Bytes accepted before giving up.
        bytes: usize,
    },

    /// A ready pattern that does not parse.
    #[error("Invalid ready pattern '{pattern}': {reason}")]
    InvalidReadyPattern {
        /// The rejected text.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
}
