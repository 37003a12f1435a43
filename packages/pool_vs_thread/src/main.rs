#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point: parses the command line, runs the full sweep and writes the results to
//! a CSV file.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::num::NonZero;
use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use pool_vs_thread::{
    CsvFileSink, DEFAULT_REPETITIONS, Orchestrator, SweepConfig, default_pool_size,
};
use tracing_subscriber::EnvFilter;

/// Compare a fixed-size worker pool (N:M) against thread-per-task (1:1) execution of the same
/// CPU-bound tasks.
#[derive(FromArgs)]
struct Args {
    /// positional arguments: [iterations per task (default 1000000)] [pool size M (default: number of processors)]
    /// [comma-separated task counts N (default 10,100,500,1000)]
    #[argh(positional)]
    positional: Vec<String>,

    /// path of the CSV result file (default results.csv)
    #[argh(option, default = "PathBuf::from(\"results.csv\")")]
    output: PathBuf,

    /// repetitions of every task count and model pair (default 3)
    #[argh(option, default = "DEFAULT_REPETITIONS")]
    repetitions: NonZero<usize>,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Args = argh::from_env();

    let config = match SweepConfig::from_positional_args(&args.positional) {
        Ok(config) => config.with_repetitions(args.repetitions),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("==== Benchmark N:M vs 1:1 ====");
    println!("Iterations per task: {}", config.iterations_per_task());
    println!("Pool size (M) for N:M: {}", config.pool_size());
    println!("Testing N = {}", config.task_counts());
    println!("Processors available: {}", default_pool_size());
    println!();

    let mut sink = match CsvFileSink::create(&args.output) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match Orchestrator::new(config).run(&mut sink) {
        Ok(recorded) => {
            let path = sink
                .path()
                .canonicalize()
                .unwrap_or_else(|_| sink.path().to_path_buf());

            println!("{recorded} results written to: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!(
                "Results recorded before the failure remain in {}",
                sink.path().display()
            );
            ExitCode::FAILURE
        }
    }
}
