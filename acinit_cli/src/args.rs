use std::path::PathBuf;

use acinit_common::{BoardPreset, ConfigError, InitProgram};
use acinit_sequencer::{DoneDestination, InitSystemConfig, ReadyPattern, StartStimulus};
use clap::Parser;

/// Audio codec init controller simulator - clock a board's init sequence through its codec bus
#[derive(Parser, Debug)]
#[command(name = "acinit")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Board whose clock tree drives the simulation
    #[arg(short = 'b', long, value_enum, default_value = "arrow-deca")]
    pub board: BoardArg,

    /// Built-in init program to stream
    #[arg(short = 'p', long, default_value = "tlv320aic3100-dac")]
    pub program: String,

    /// Load the init program from a JSON file instead of the built-in table
    #[arg(short = 'f', long, conflicts_with = "program")]
    pub program_file: Option<PathBuf>,

    /// Operating domain of the sequencer
    #[arg(short = 'd', long, default_value = "sync")]
    pub domain: String,

    /// Observe done in another domain through a synchronizer
    #[arg(long)]
    pub done_domain: Option<String>,

    /// Consumer ready behavior: always, never, every:N, after:N or cycle:BITS
    #[arg(short = 'r', long, default_value = "always")]
    pub ready: ReadyPattern,

    /// Time in picoseconds at which the start input rises and stays high
    #[arg(long, default_value_t = 0)]
    pub start_ps: u64,

    /// Give up after this many operating domain cycles
    #[arg(long, default_value_t = 100_000)]
    pub max_cycles: u64,

    /// Write every accepted byte to this CSV file
    #[arg(long)]
    pub trace_csv: Option<PathBuf>,

    /// Simulate every built-in program in parallel
    #[arg(long, default_value_t = false)]
    pub all_programs: bool,
}

impl Args {
    /// The selected program, from file or from the built-in table.
    pub fn program(&self) -> Result<InitProgram, ConfigError> {
        match &self.program_file {
            Some(path) => InitProgram::from_json_file(path),
            None => InitProgram::builtin(&self.program).cloned(),
        }
    }

    /// Convert command-line arguments into a system configuration for `program`
    pub fn to_config(&self, program: InitProgram) -> Result<InitSystemConfig, ConfigError> {
        let config = InitSystemConfig::for_board(self.board.clone().into(), program)?;
        let operating = config.assembly.require_domain(&self.domain)?.key.clone();
        let done = match &self.done_domain {
            Some(name) if name != operating.name() => DoneDestination::Resynchronized {
                domain: config.assembly.require_domain(name)?.key.clone(),
            },
            _ => DoneDestination::Local,
        };

        Ok(config
            .with_domain(operating.name())
            .with_done_destination(done)
            .with_start(StartStimulus::held_from(self.start_ps)))
    }
}

/// Command-line argument wrapper for BoardPreset
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum BoardArg {
    /// Arrow DECA, 60 MHz ULPI reference
    #[value(name = "arrow-deca")]
    ArrowDeca,
    /// QMTech 10CL006 core board, 50 MHz reference
    #[value(name = "qmtech-10cl006")]
    Qmtech10cl006,
}

impl From<BoardArg> for BoardPreset {
    fn from(arg: BoardArg) -> Self {
        match arg {
            BoardArg::ArrowDeca => BoardPreset::ArrowDeca,
            BoardArg::Qmtech10cl006 => BoardPreset::Qmtech10cl006,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> Result<InitSystemConfig, ConfigError> {
        let args = Args::parse_from(argv);
        let program = args.program()?;
        args.to_config(program)
    }

    #[test]
    fn done_domain_is_resolved_on_the_board() {
        let config = config(&["acinit", "--done-domain", "usb"]).unwrap();
        match config.done {
            DoneDestination::Resynchronized { domain } => assert_eq!(domain.name(), "usb"),
            other => panic!("expected a resynchronized destination, got {other}"),
        }
    }

    #[test]
    fn done_domain_equal_to_operating_domain_is_local() {
        let config = config(&["acinit", "--done-domain", "sync"]).unwrap();
        assert_eq!(config.done, DoneDestination::Local);
    }

    #[test]
    fn missing_or_empty_domains_are_errors() {
        for argv in [
            &["acinit", "--done-domain", ""][..],
            &["acinit", "--done-domain", "nowhere"][..],
            &["acinit", "--domain", ""][..],
        ] {
            let err = config(argv).unwrap_err();
            assert!(matches!(err, ConfigError::UnknownDomain(_)), "{argv:?}: {err}");
        }
    }
}
