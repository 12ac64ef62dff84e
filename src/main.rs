//! # Latency Analysis - Main Entry Point
//!
//! Command-line front end for the latency analysis library. It reads the
//! CSV files written by the benchmark harness, aggregates them per
//! configuration and compares the communication patterns.
//!
//! ## Architecture Overview
//!
//! The main function performs these key operations:
//! 1. **Parse arguments**: Processes command-line configuration
//! 2. **Initialize logging**: Console output plus an optional log file
//! 3. **Create analysis config**: Converts CLI args to internal config
//! 4. **Run the analysis**: Loads, aggregates and compares every pattern
//! 5. **Write results**: JSON report, optional summary CSV, console summary
//!
//! ## Error Handling
//!
//! Missing patterns and malformed rows are reported and skipped. The process
//! exits with an error only for an invalid request or when the report
//! cannot be written.

use anyhow::Result;
use clap::Parser;
use latency_analysis::{
    analysis::AnalysisRunner,
    cli::{AnalysisConfig, Args},
    logging,
    results::ResultsManager,
};
use tracing::{debug, info};

fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so the log file is flushed on exit.
    let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;

    info!("Starting latency analysis v{}", latency_analysis::VERSION);
    debug!("Configuration: {:?}", args);

    let config = AnalysisConfig::from(&args);
    let runner = AnalysisRunner::new(config)?;
    let report = runner.run()?;

    let mut results_manager = ResultsManager::new(&args.output_file);
    if let Some(ref summary_csv) = args.summary_csv {
        results_manager = results_manager.with_summary_csv(summary_csv);
    }
    results_manager.write(&report)?;

    if !args.quiet {
        results_manager.print_summary(&report);
    }

    info!("Latency analysis completed successfully");
    Ok(())
}
