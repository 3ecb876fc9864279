//! Clock and reset domain control.
//!
//! This crate turns a declarative [`acinit_common::BoardSpec`] into an
//! operational [`DomainAssembly`] and runs it on a shared picosecond timeline
//! through [`ClockTree`]. Frequency synthesizers are modeled only by their
//! contract: derived clock periods from [`synthesize`] and a `locked` flag
//! from a [`LockModel`]. Every domain's reset is driven by a
//! [`ResetSynchronizer`] that stays asserted until all of its synthesizers
//! have locked.

pub mod assembly;
pub mod key;
pub mod reset;
pub mod synth;
pub mod tree;

pub use assembly::{Domain, DomainAssembly, DomainAssemblyBuilder, SynthNode};
pub use key::DomainKey;
pub use reset::ResetSynchronizer;
pub use synth::{DerivedClock, LockModel, PllModel, SynthOutputs, synthesize};
pub use tree::{ClockTree, DomainEdge, Tick};
