use crate::cli::{AnalysisConfig, GroupBy, Pattern};
use crate::comparison::{ComparisonResult, Comparisons, PatternRank, Ratio, ScalingResult};
use crate::loader::LoadStats;
use crate::metrics::{throughput_estimate, DistributionSummary, SummaryTable, ThroughputEstimate};
use crate::record::ConfigKey;
use crate::utils::{
    format_bytes, format_latency_ms, format_percentage, format_table_row, format_table_separator,
};
use anyhow::{Context, Result};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete analysis output handed to renderers
///
/// Patterns are ordered by name and every per-pattern sequence by ascending
/// configuration key, so consumers can plot without re-sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub patterns: BTreeMap<Pattern, PatternReport>,
    /// Requested patterns with no input files
    pub missing_patterns: Vec<Pattern>,
    pub comparisons: Vec<ComparisonResult>,
    /// Configurations present in only one side of a comparison
    pub skipped_comparisons: usize,
    /// Compound patterns compared with each other (two-hop against sequential)
    #[serde(default)]
    pub pairwise: Vec<ComparisonResult>,
    pub ranking: Vec<PatternRank>,
}

impl AnalysisReport {
    /// Summaries of `pattern` in key order, if it has data
    pub fn summaries(&self, pattern: Pattern) -> Option<&[KeyedSummary]> {
        self.patterns.get(&pattern).map(|p| p.summaries.as_slice())
    }
}

/// Run metadata for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub run_id: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub group_by: GroupBy,
    pub percentiles: Vec<f64>,
    pub baseline: Pattern,
    pub patterns_requested: Vec<Pattern>,
}

/// Everything computed for one pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReport {
    pub pattern: Pattern,
    pub load: LoadStats,
    pub success_rate_pct: Ratio,
    pub overview: PatternOverview,
    /// Every successful latency of the pattern as one distribution
    pub overall: Option<DistributionSummary>,
    pub summaries: Vec<KeyedSummary>,
    pub scaling: Vec<ScalingResult>,
    pub payload_latency_correlation: Ratio,
}

/// A distribution summary with its configuration key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedSummary {
    pub key: ConfigKey,
    pub summary: DistributionSummary,
    pub throughput: ThroughputEstimate,
}

/// Ranges across all configurations of one pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternOverview {
    pub configurations: usize,
    pub total_measurements: usize,
    pub payload_range: Option<(u64, u64)>,
    pub mean_range_ms: Option<(f64, f64)>,
    pub p95_range_ms: Option<(f64, f64)>,
}

impl PatternOverview {
    fn from_table(table: &SummaryTable) -> Self {
        fn range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
            values.fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
        }

        let payloads = table.keys().filter_map(|k| k.payload_size);
        let payload_range = payloads.fold(None, |acc: Option<(u64, u64)>, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        });

        Self {
            configurations: table.len(),
            total_measurements: table.values().map(|s| s.count).sum(),
            payload_range,
            mean_range_ms: range(table.values().map(|s| s.mean)),
            p95_range_ms: range(table.values().filter_map(|s| s.percentile(95.0))),
        }
    }
}

/// Collects per-pattern results and comparisons into an [`AnalysisReport`]
pub struct ReportAssembler {
    metadata: ReportMetadata,
    patterns: BTreeMap<Pattern, PatternReport>,
    missing: BTreeSet<Pattern>,
}

impl ReportAssembler {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                run_id: crate::utils::generate_run_id(),
                generated_at: chrono::Utc::now(),
                group_by: config.group_by,
                percentiles: crate::metrics::normalize_percentiles(&config.percentiles),
                baseline: config.baseline,
                patterns_requested: config.patterns.clone(),
            },
            patterns: BTreeMap::new(),
            missing: BTreeSet::new(),
        }
    }

    /// Record the results of one loaded pattern
    pub fn add_pattern(
        &mut self,
        pattern: Pattern,
        load: LoadStats,
        table: &SummaryTable,
        overall: Option<DistributionSummary>,
        scaling: Vec<ScalingResult>,
        payload_latency_correlation: Ratio,
    ) {
        debug!("Assembling {} configurations for {}", table.len(), pattern);

        let summaries = table
            .iter()
            .map(|(key, summary)| KeyedSummary {
                key: *key,
                summary: summary.clone(),
                throughput: throughput_estimate(key, summary),
            })
            .collect();

        self.missing.remove(&pattern);
        self.patterns.insert(
            pattern,
            PatternReport {
                pattern,
                success_rate_pct: load.success_rate_pct(),
                load,
                overview: PatternOverview::from_table(table),
                overall,
                summaries,
                scaling,
                payload_latency_correlation,
            },
        );
    }

    /// Record a requested pattern that had no data
    pub fn mark_missing(&mut self, pattern: Pattern) {
        if !self.patterns.contains_key(&pattern) {
            self.missing.insert(pattern);
        }
    }

    pub fn finish(
        self,
        comparisons: Comparisons,
        pairwise: Comparisons,
        ranking: Vec<PatternRank>,
    ) -> AnalysisReport {
        fn sorted(mut results: Vec<ComparisonResult>) -> Vec<ComparisonResult> {
            results.sort_by(|a, b| {
                (a.candidate, a.baseline, a.key).cmp(&(b.candidate, b.baseline, b.key))
            });
            results
        }

        AnalysisReport {
            metadata: self.metadata,
            patterns: self.patterns,
            missing_patterns: self.missing.into_iter().collect(),
            comparisons: sorted(comparisons.results),
            skipped_comparisons: comparisons.skipped_configurations,
            pairwise: sorted(pairwise.results),
            ranking,
        }
    }
}

/// Results manager for writing and displaying an analysis report
pub struct ResultsManager {
    output_file: PathBuf,
    summary_csv: Option<PathBuf>,
}

impl ResultsManager {
    /// Create a new results manager
    pub fn new(output_file: &Path) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            summary_csv: None,
        }
    }

    /// Also write a flat CSV table of every summary
    pub fn with_summary_csv<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.summary_csv = Some(path.as_ref().to_path_buf());
        self
    }

    /// Write the report as JSON, plus the CSV table if enabled
    pub fn write(&self, report: &AnalysisReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&self.output_file, json)
            .with_context(|| format!("Failed to write report to {:?}", self.output_file))?;
        info!("Results written to: {:?}", self.output_file);

        if let Some(ref csv_path) = self.summary_csv {
            write_summary_csv(report, csv_path)?;
            info!("Summary table written to: {:?}", csv_path);
        }
        Ok(())
    }

    /// Read back a report written by [`ResultsManager::write`]
    pub fn read(path: &Path) -> Result<AnalysisReport> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report from {:?}", path))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Print the console summary
    pub fn print_summary(&self, report: &AnalysisReport) {
        print!("{}", render_summary(report));
    }
}

/// Write one CSV row per (pattern, configuration)
pub fn write_summary_csv(report: &AnalysisReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create summary CSV {:?}", path))?;

    let mut header: Vec<String> = [
        "pattern",
        "worker_count",
        "payload_size",
        "count",
        "mean_ms",
        "median_ms",
        "stddev_ms",
        "min_ms",
        "max_ms",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(report.metadata.percentiles.iter().map(|p| format!("p{}_ms", p)));
    writer.write_record(&header)?;

    for (pattern, pattern_report) in &report.patterns {
        for entry in &pattern_report.summaries {
            let s = &entry.summary;
            let mut row = vec![
                pattern.to_string(),
                entry.key.worker_count.map(|n| n.to_string()).unwrap_or_default(),
                entry.key.payload_size.map(|p| p.to_string()).unwrap_or_default(),
                s.count.to_string(),
                s.mean.to_string(),
                s.median.to_string(),
                s.stddev.to_string(),
                s.min.to_string(),
                s.max.to_string(),
            ];
            row.extend(
                report
                    .metadata
                    .percentiles
                    .iter()
                    .map(|&p| s.percentile(p).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Render the console summary of a report
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "{}", "LATENCY ANALYSIS SUMMARY".bold());
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Grouped by {} | baseline: {} | run {}",
        report.metadata.group_by, report.metadata.baseline, report.metadata.run_id
    );

    for pattern in &report.missing_patterns {
        let _ = writeln!(
            out,
            "\n{}",
            format!("{} PATTERN: No data available", pattern.name().to_uppercase()).yellow()
        );
    }

    for (pattern, p) in &report.patterns {
        let _ = writeln!(
            out,
            "\n{}",
            format!("{} PATTERN SUMMARY", pattern.name().to_uppercase())
                .bold()
                .cyan()
        );
        let _ = writeln!(
            out,
            "Measurements: {} successful, {} failed, {} dropped (success rate {}) from {} files",
            p.load.successful_rows,
            p.load.failed_rows,
            p.load.dropped_rows,
            format_percentage(&p.success_rate_pct, false),
            p.load.files_read
        );
        if let Some((lo, hi)) = p.overview.payload_range {
            let _ = writeln!(
                out,
                "Payload range: {} - {}",
                format_bytes(lo as usize),
                format_bytes(hi as usize)
            );
        }
        if let Some((lo, hi)) = p.overview.mean_range_ms {
            let _ = writeln!(
                out,
                "Mean latency range: {} - {}",
                format_latency_ms(lo),
                format_latency_ms(hi)
            );
        }
        let _ = writeln!(
            out,
            "Payload/latency correlation: {}",
            p.payload_latency_correlation
        );
        if let Some(ref overall) = p.overall {
            let _ = writeln!(
                out,
                "Overall: {} measurements, mean {}, median {}, max {}",
                overall.count,
                format_latency_ms(overall.mean),
                format_latency_ms(overall.median),
                format_latency_ms(overall.max)
            );
        }

        let mut headers = vec!["Config".to_string(), "Count".to_string(), "Mean".to_string()];
        headers.extend(report.metadata.percentiles.iter().map(|p| format!("P{}", p)));
        headers.push("StdDev".to_string());
        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, _)| if i == 0 { 18 } else { 10 })
            .collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

        out.push_str(&format_table_separator(&widths));
        out.push_str(&format_table_row(&header_refs, &widths));
        out.push_str(&format_table_separator(&widths));
        for entry in &p.summaries {
            let mut cells = vec![
                entry.key.to_string(),
                entry.summary.count.to_string(),
                format_latency_ms(entry.summary.mean),
            ];
            cells.extend(
                entry
                    .summary
                    .percentiles
                    .iter()
                    .map(|v| format_latency_ms(v.value_ms)),
            );
            cells.push(format_latency_ms(entry.summary.stddev));
            let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
            out.push_str(&format_table_row(&refs, &widths));
        }
        out.push_str(&format_table_separator(&widths));

        for s in &p.scaling {
            let slice = s
                .worker_count
                .map(|n| format!(" at N={}", n))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "Scaling{}: config x{} -> latency x{} (ratio {})",
                slice, s.config_ratio, s.latency_ratio, s.scaling_ratio
            );
        }
    }

    if !report.ranking.is_empty() {
        let _ = writeln!(out, "\n{}", "PATTERN RANKING (by average latency)".bold());
        for entry in &report.ranking {
            let _ = writeln!(
                out,
                "  {}. {}: {} average ({} vs {})",
                entry.rank,
                entry.pattern,
                format_latency_ms(entry.average_mean_ms),
                format_percentage(&entry.overhead_pct, true),
                report.metadata.baseline
            );
        }
    }

    if !report.comparisons.is_empty() {
        let _ = writeln!(
            out,
            "\n{}",
            format!("OVERHEAD VS {}", report.metadata.baseline.name().to_uppercase()).bold()
        );
        let widths = [12, 18, 12, 12];
        out.push_str(&format_table_separator(&widths));
        out.push_str(&format_table_row(
            &["Pattern", "Config", "Overhead", "Efficiency"],
            &widths,
        ));
        out.push_str(&format_table_separator(&widths));
        for c in &report.comparisons {
            let key = c.key.to_string();
            let overhead = format_percentage(&c.overhead_pct, true);
            let efficiency = format_percentage(&c.efficiency_pct, false);
            out.push_str(&format_table_row(
                &[c.candidate.name(), &key, &overhead, &efficiency],
                &widths,
            ));
        }
        out.push_str(&format_table_separator(&widths));
        if report.skipped_comparisons > 0 {
            let _ = writeln!(
                out,
                "{}",
                format!(
                    "{} configurations had no counterpart and were not compared",
                    report.skipped_comparisons
                )
                .yellow()
            );
        }
    }

    let mut pair_heading = None;
    for c in &report.pairwise {
        if pair_heading != Some((c.candidate, c.baseline)) {
            let heading = format!(
                "{} VS {}",
                c.candidate.name().to_uppercase(),
                c.baseline.name().to_uppercase()
            );
            let _ = writeln!(out, "\n{}", heading.bold());
            pair_heading = Some((c.candidate, c.baseline));
        }
        let _ = writeln!(out, "  {}: {}", c.key, describe_difference(c));
    }

    out
}

/// One-line reading of a candidate's overhead against its reference pattern
fn describe_difference(c: &ComparisonResult) -> String {
    match c.overhead_pct.value() {
        Some(v) if v < 0.0 => format!("{} is {:.1}% faster than {}", c.candidate, -v, c.baseline),
        Some(v) if v > 0.0 => format!("{} is {:.1}% slower than {}", c.candidate, v, c.baseline),
        Some(_) => format!("{} matches {}", c.candidate, c.baseline),
        None => format!("{} vs {}: n/a", c.candidate, c.baseline),
    }
}
