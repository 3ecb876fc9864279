//! Common configuration types shared across the acinit workspace.
//!
//! This crate holds everything that is decided before a design becomes
//! operational: the packet programs streamed to the codec, the frequency
//! synthesizer settings, the board presets that bind clock domains, and the
//! [`ConfigError`] returned when any of these fail validation.

mod board;
mod clock;
mod error;
mod packet;
mod program;
mod synth;

pub use crate::board::*;
pub use crate::clock::*;
pub use crate::error::*;
pub use crate::packet::*;
pub use crate::program::*;
pub use crate::synth::*;
