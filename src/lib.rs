//! # Latency Analysis Library
//!
//! Offline analysis of latency benchmark results. Benchmark harnesses drop
//! CSV files with one row per request; this library turns them into
//! per-configuration distribution statistics and compares communication
//! patterns against each other.
//!
//! ## Communication Patterns
//!
//! - **Direct**: the client talks to the server in a single hop
//! - **Sequential**: the client performs two independent direct calls
//! - **Two-hop**: the request is relayed through an intermediary
//!
//! ## Architecture Overview
//!
//! - `loader`: Input discovery and CSV parsing into measurement records
//! - `metrics`: Per-configuration distribution statistics
//! - `comparison`: Cross-pattern overhead, efficiency, scaling and ranking
//! - `analysis`: Orchestration of a full run
//! - `results`: Report assembly, JSON/CSV output and the console summary
//! - `cli`: Command-line parsing and run configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use latency_analysis::{AnalysisConfig, AnalysisRunner, DataSource, GroupBy, Pattern};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AnalysisConfig {
//!         patterns: vec![Pattern::Direct, Pattern::TwoHop],
//!         source: DataSource::Directory("csvfiles".into()),
//!         group_by: GroupBy::PayloadSize,
//!         percentiles: vec![50.0, 95.0, 99.0],
//!         baseline: Pattern::Direct,
//!     };
//!
//!     let report = AnalysisRunner::new(config)?.run()?;
//!     for comparison in &report.comparisons {
//!         println!("{} at {}: {}", comparison.candidate, comparison.key, comparison.overhead_pct);
//!     }
//!     Ok(())
//! }
//! ```

/// Analysis orchestration
///
/// Contains the `AnalysisRunner`, which loads every requested pattern in
/// parallel, aggregates it and hands the tables to the comparator.
pub mod analysis;

/// Command-line interface and configuration
///
/// Provides argument parsing using clap and converts CLI options into an
/// `AnalysisConfig`. Pattern selection supports "all" expansion.
pub mod cli;

/// Cross-pattern comparison
///
/// Overhead and efficiency per shared configuration, scaling between the
/// smallest and largest configuration, and pattern ranking. Every derived
/// ratio is a `Ratio`, which is explicitly undefined for zero denominators.
pub mod comparison;

pub mod error;

/// Input discovery and CSV parsing
///
/// Supports both the per-pattern flat layout and the sweep layout with
/// worker-count directories and sharded CSV files.
pub mod loader;

pub mod logging;

/// Distribution statistics
///
/// Exact nearest-rank percentiles, mean, median, sample standard deviation
/// and range per configuration key.
pub mod metrics;

pub mod record;

/// Report assembly and output
///
/// Builds the structured `AnalysisReport`, writes it as JSON and optional
/// summary CSV, and renders the console summary.
pub mod results;

pub mod utils;

// Re-export key types for convenient library usage

/// Main analysis engine
pub use analysis::AnalysisRunner;

/// Command-line interface types
pub use cli::{AnalysisConfig, Args, GroupBy, Pattern};

pub use comparison::{ComparisonResult, Ratio, UndefinedReason};

pub use error::AnalysisError;

pub use loader::{DataSource, Loader};

pub use metrics::{Aggregator, DistributionSummary, SummaryTable};

pub use record::{ConfigKey, MeasurementRecord};

/// Result collection and management
///
/// The `AnalysisReport` structure and the `ResultsManager` for output handling.
pub use results::{AnalysisReport, ResultsManager};

/// The current version of the analysis tool
///
/// Populated from Cargo.toml and recorded in every report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Directory scanned for benchmark CSV files
    ///
    /// Benchmark harnesses write their results here by default.
    pub const RESULTS_DIR: &str = "csvfiles";

    /// Default report file name
    pub const OUTPUT_FILE: &str = "analysis_results.json";

    /// Percentiles reported when none are requested
    pub const PERCENTILES: [f64; 3] = [50.0, 95.0, 99.0];
}
