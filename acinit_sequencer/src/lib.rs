//! The codec init sequencer and the simulation harness that clocks it.
//!
//! Every synchronous component here exposes the same two-phase shape: a
//! read-only view of what it presents during the current cycle, and a
//! `step` that commits the register updates of one clock edge. The
//! [`InitSystem`] harness reads every component first and commits second,
//! so no component ever observes a partial update from the same edge.

pub mod audio_init;
pub mod cdc;
pub mod done;
pub mod error;
pub mod stream;
pub mod streamer;
pub mod system;

pub use audio_init::AudioInit;
pub use cdc::{FfSynchronizer, RisingEdgeDetector, StartTrigger};
pub use done::{DoneDestination, DoneLatch};
pub use error::SimError;
pub use stream::{
    PatternedConsumer, ReadyPattern, StreamBeat, StreamConsumer, TransactionCollector,
};
pub use streamer::{PacketListStreamer, StreamerOutputs, StreamerState};
pub use system::{InitSystem, InitSystemConfig, RunReport, StartStimulus, TransferRecord};
