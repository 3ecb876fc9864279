//! acinit CLI
//!
//! Runs the codec init sequence on a simulated board: the board's clock tree
//! comes out of reset, the start input crosses into the operating domain, and
//! the program's register writes are streamed to a consumer with the chosen
//! ready behavior.

#[global_allocator]
/// Global allocator using jemalloc for better performance in parallel workloads.
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod args;

use std::path::Path;

use acinit_common::InitProgram;
use acinit_sequencer::{InitSystem, PatternedConsumer, RunReport, SimError};
use clap::Parser;
use rayon::prelude::*;
use tracing::{error, info};

use args::Args;

/// Executes the acinit simulator.
///
/// This function:
/// 1. Initializes logging
/// 2. Parses command-line arguments
/// 3. Simulates the selected program (or all built-in programs)
/// 4. Prints the transaction report and optionally writes the byte trace
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if args.all_programs {
        let programs = InitProgram::builtins().collect::<Vec<_>>();
        info!("Simulating {} built-in programs", programs.len());

        let results = programs
            .par_iter()
            .map(|program| (program.name.as_str(), simulate(&args, (*program).clone())))
            .collect::<Vec<_>>();

        let mut failures = 0;
        for (name, result) in results {
            match result {
                Ok(report) => println!("{report}"),
                Err(e) => {
                    error!("Program '{}' failed: {}", name, e);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Err(format!("{failures} program(s) did not complete").into());
        }
        return Ok(());
    }

    let program = args.program()?;
    info!(
        "Loaded program '{}' ({} packets, {} bytes)",
        program.name,
        program.packets.len(),
        program.packets.total_bytes()
    );

    let report = simulate(&args, program)?;
    println!("{report}");

    if let Some(path) = &args.trace_csv {
        write_trace(path, &report)?;
        info!("Wrote {} transfers to {}", report.bytes(), path.display());
    }

    Ok(())
}

/// Builds the system for `program` and runs it until done is visible.
fn simulate(args: &Args, program: InitProgram) -> Result<RunReport, SimError> {
    let config = args.to_config(program)?;
    let consumer = PatternedConsumer::new(args.ready.clone());
    let mut system = InitSystem::new(config, consumer)?;
    system.run_until_done(args.max_cycles)
}

fn write_trace(path: &Path, report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for transfer in &report.transfers {
        writer.serialize(transfer)?;
    }
    writer.flush()?;
    Ok(())
}
