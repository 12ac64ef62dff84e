//! # Analysis Engine Module
//!
//! Orchestrates one analysis run: every requested pattern is loaded and
//! aggregated independently, then the summary tables are compared against
//! the baseline pattern and assembled into an [`AnalysisReport`].
//!
//! ## Execution Flow
//!
//! 1. **Validation**: the request is checked before any file is opened
//! 2. **Per-pattern analysis**: patterns are processed in parallel with rayon.
//!    Each one is loaded, aggregated and given its scaling ratios and
//!    payload/latency correlation
//! 3. **Comparison**: overhead and efficiency against the baseline, two-hop
//!    against sequential, and the ranking
//! 4. **Assembly**: results are merged in pattern order, so parallel
//!    execution never changes the report
//!
//! ## Error Handling
//!
//! A pattern without data is reported in `missing_patterns` and the run
//! continues with the remaining patterns. Only an invalid request aborts.

use crate::cli::{AnalysisConfig, Pattern};
use crate::comparison::{compare_pairwise, compare_patterns, rank_patterns, scaling, Ratio};
use crate::error::AnalysisError;
use crate::loader::{LoadStats, Loader};
use crate::metrics::{payload_latency_correlation, Aggregator, DistributionSummary, SummaryTable};
use crate::results::{AnalysisReport, ReportAssembler};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Aggregated data for one pattern, ready to be compared
#[derive(Debug)]
struct PatternAnalysis {
    stats: LoadStats,
    table: SummaryTable,
    overall: Option<DistributionSummary>,
    correlation: Ratio,
}

/// Analysis runner that drives loading, aggregation and comparison
pub struct AnalysisRunner {
    config: AnalysisConfig,
    loader: Loader,
    aggregator: Aggregator,
}

impl AnalysisRunner {
    /// Create a runner for a validated configuration
    ///
    /// Fails with `InvalidRequest` when the configuration cannot produce any
    /// statistics (no patterns, a compound baseline, bad percentiles).
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;

        let loader = Loader::new(config.source.clone()).with_patterns(&config.patterns);
        let aggregator = Aggregator::new(config.group_by, &config.percentiles);

        Ok(Self {
            config,
            loader,
            aggregator,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis and return the assembled report
    pub fn run(&self) -> Result<AnalysisReport> {
        let start_time = Instant::now();
        info!(
            "Analyzing {} pattern(s) grouped by {}, baseline {}",
            self.config.patterns.len(),
            self.config.group_by,
            self.config.baseline
        );

        let outcomes: Vec<(Pattern, Result<PatternAnalysis, AnalysisError>)> = self
            .config
            .patterns
            .par_iter()
            .map(|&pattern| (pattern, self.analyze_pattern(pattern)))
            .collect();

        let mut assembler = ReportAssembler::new(&self.config);
        let mut tables: BTreeMap<Pattern, SummaryTable> = BTreeMap::new();

        for (pattern, outcome) in outcomes {
            match outcome {
                Ok(analysis) => {
                    let scaling = scaling(&analysis.table, self.config.group_by);
                    assembler.add_pattern(
                        pattern,
                        analysis.stats,
                        &analysis.table,
                        analysis.overall,
                        scaling,
                        analysis.correlation,
                    );
                    tables.insert(pattern, analysis.table);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e @ AnalysisError::SourceNotFound { .. }) => {
                    info!("{}", e);
                    assembler.mark_missing(pattern);
                }
                Err(e) => {
                    warn!("Analysis of {} pattern failed: {}", pattern, e);
                    assembler.mark_missing(pattern);
                }
            }
        }

        let comparisons = compare_patterns(&tables, self.config.baseline);
        let pairwise = compare_pairwise(&tables);
        let ranking = rank_patterns(&tables, self.config.baseline);
        let report = assembler.finish(comparisons, pairwise, ranking);

        info!(
            "Analysis completed in {:?}: {} pattern(s) analyzed, {} missing, {} comparison(s)",
            start_time.elapsed(),
            report.patterns.len(),
            report.missing_patterns.len(),
            report.comparisons.len()
        );
        Ok(report)
    }

    fn analyze_pattern(&self, pattern: Pattern) -> Result<PatternAnalysis, AnalysisError> {
        let load = self.loader.load(pattern)?;
        let table = self.aggregator.aggregate(&load.records);
        let overall = self.aggregator.summarize_all(&load.records).ok();
        let correlation = payload_latency_correlation(&load.records);

        debug!(
            "{} pattern: {} configuration(s) from {} record(s)",
            pattern,
            table.len(),
            load.records.len()
        );

        Ok(PatternAnalysis {
            stats: load.stats,
            table,
            overall,
            correlation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::GroupBy;
    use crate::loader::DataSource;
    use crate::record::ConfigKey;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const HEADER: &str = "PayloadSize,LatencyMs,Success\n";

    fn write_flat(dir: &Path, pattern: &str, rows: &str) {
        let path = dir.join(format!("benchmark_results_{}.csv", pattern));
        fs::write(path, format!("{}{}", HEADER, rows)).unwrap();
    }

    fn config(dir: &Path, patterns: Vec<Pattern>) -> AnalysisConfig {
        AnalysisConfig {
            patterns,
            source: DataSource::Directory(dir.to_path_buf()),
            group_by: GroupBy::PayloadSize,
            percentiles: vec![50.0, 95.0, 99.0],
            baseline: Pattern::Direct,
        }
    }

    #[test]
    fn test_runner_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(dir.path(), vec![]);
        assert!(AnalysisRunner::new(cfg.clone()).is_err());

        cfg.patterns = vec![Pattern::Direct];
        cfg.percentiles = vec![150.0];
        let err = AnalysisRunner::new(cfg).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_overhead_between_patterns() {
        let dir = TempDir::new().unwrap();
        write_flat(dir.path(), "direct", "64,1.0\n64,1.0,1\n64,1.0,1\n");
        write_flat(dir.path(), "twohop", "64,2.2,1\n64,2.2,1\n");

        let runner =
            AnalysisRunner::new(config(dir.path(), vec![Pattern::Direct, Pattern::TwoHop]))
                .unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.patterns.len(), 2);
        assert!(report.missing_patterns.is_empty());
        assert_eq!(report.comparisons.len(), 1);

        let comparison = &report.comparisons[0];
        assert_eq!(comparison.candidate, Pattern::TwoHop);
        assert_eq!(comparison.key, ConfigKey::payload(64));
        let overhead = comparison.overhead_pct.value().unwrap();
        assert!((overhead - 120.0).abs() < 1e-9);

        // The row with only two fields is dropped, not fatal.
        let direct = &report.patterns[&Pattern::Direct];
        assert_eq!(direct.load.dropped_rows, 1);
        assert_eq!(direct.load.successful_rows, 2);

        let overall = direct.overall.as_ref().unwrap();
        assert_eq!(overall.count, 2);
        assert_eq!(overall.mean, 1.0);
    }

    #[test]
    fn test_missing_pattern_does_not_abort() {
        let dir = TempDir::new().unwrap();
        write_flat(dir.path(), "direct", "64,1.0,1\n128,2.0,1\n");

        let runner = AnalysisRunner::new(config(
            dir.path(),
            vec![Pattern::Direct, Pattern::Sequential, Pattern::TwoHop],
        ))
        .unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.patterns.len(), 1);
        assert_eq!(
            report.missing_patterns,
            vec![Pattern::Sequential, Pattern::TwoHop]
        );
        assert!(report.comparisons.is_empty());
        assert!(report.pairwise.is_empty());
        assert_eq!(report.ranking.len(), 1);
    }

    #[test]
    fn test_missing_baseline_yields_no_comparisons() {
        let dir = TempDir::new().unwrap();
        write_flat(dir.path(), "sequential", "64,2.0,1\n");
        write_flat(dir.path(), "twohop", "64,3.0,1\n");

        let runner = AnalysisRunner::new(config(
            dir.path(),
            vec![Pattern::Sequential, Pattern::TwoHop],
        ))
        .unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.patterns.len(), 2);
        assert!(report.comparisons.is_empty());

        // The compound patterns are still compared with each other.
        assert_eq!(report.pairwise.len(), 1);
        assert_eq!(report.pairwise[0].overhead_pct, Ratio::Defined(50.0));
    }

    #[test]
    fn test_all_rows_failed_gives_empty_table() {
        let dir = TempDir::new().unwrap();
        write_flat(dir.path(), "direct", "64,,0\n64,5.0,0\n");

        let runner = AnalysisRunner::new(config(dir.path(), vec![Pattern::Direct])).unwrap();
        let report = runner.run().unwrap();

        let direct = &report.patterns[&Pattern::Direct];
        assert!(direct.summaries.is_empty());
        assert!(direct.overall.is_none());
        assert_eq!(direct.load.failed_rows, 2);
        assert_eq!(direct.success_rate_pct, Ratio::Defined(0.0));
    }

    #[test]
    fn test_report_is_independent_of_request_order() {
        let dir = TempDir::new().unwrap();
        write_flat(dir.path(), "direct", "64,1.0,1\n256,1.5,1\n");
        write_flat(dir.path(), "sequential", "64,2.0,1\n256,3.5,1\n");
        write_flat(dir.path(), "twohop", "64,2.5,1\n256,4.0,1\n");

        let forward = AnalysisRunner::new(config(
            dir.path(),
            vec![Pattern::Direct, Pattern::Sequential, Pattern::TwoHop],
        ))
        .unwrap()
        .run()
        .unwrap();
        let reverse = AnalysisRunner::new(config(
            dir.path(),
            vec![Pattern::TwoHop, Pattern::Sequential, Pattern::Direct],
        ))
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(forward.comparisons, reverse.comparisons);
        assert_eq!(forward.pairwise, reverse.pairwise);
        assert_eq!(forward.ranking, reverse.ranking);
        assert_eq!(
            forward.summaries(Pattern::TwoHop),
            reverse.summaries(Pattern::TwoHop)
        );
    }
}
