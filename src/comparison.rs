//! # Cross-Pattern Comparison
//!
//! Derives ratios from already-computed distribution summaries:
//!
//! - **Overhead**: `(candidate.mean - baseline.mean) / baseline.mean * 100`
//!   at every configuration key both patterns share.
//! - **Efficiency**: `(1 - (candidate.mean - reference) / reference) * 100`,
//!   where `reference` is the baseline mean scaled by the candidate's hop
//!   multiplier. 100% means the candidate costs exactly the naive multiple;
//!   higher values mean the hops overlap.
//! - **Scaling**: `(max_config / min_config) / (mean(max) / mean(min))` along
//!   the swept variable. Above 1 latency grows sub-linearly, below 1
//!   super-linearly.
//! - **Pairwise**: the same overhead between the two compound patterns,
//!   two-hop measured against sequential, independent of the baseline.
//! - **Ranking**: patterns ordered by the average of their per-key means.
//!
//! Every division goes through [`ratio`], so a zero denominator or missing
//! input becomes [`Ratio::Undefined`] instead of NaN or infinity.

use crate::cli::{GroupBy, Pattern};
use crate::error::AnalysisError;
use crate::metrics::{DistributionSummary, SummaryTable};
use crate::record::ConfigKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Why a derived metric has no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    ZeroDenominator,
    MissingInput,
    SingleConfiguration,
}

/// A derived metric, or an explicit marker that it cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ratio {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Ratio {
    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }

    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Ratio {
        match self {
            Ratio::Defined(v) => Ratio::Defined(f(v)),
            undefined => undefined,
        }
    }

    pub fn and_then<F: FnOnce(f64) -> Ratio>(self, f: F) -> Ratio {
        match self {
            Ratio::Defined(v) => f(v),
            undefined => undefined,
        }
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{:.2}", v),
            Ratio::Undefined(_) => write!(f, "n/a"),
        }
    }
}

/// Divide `numerator` by `denominator`, marking degenerate cases undefined
pub fn ratio(metric: &'static str, numerator: f64, denominator: f64) -> Ratio {
    if !numerator.is_finite() || !denominator.is_finite() {
        debug!("{}", AnalysisError::DegenerateDenominator { metric });
        return Ratio::Undefined(UndefinedReason::MissingInput);
    }
    if denominator == 0.0 {
        debug!("{}", AnalysisError::DegenerateDenominator { metric });
        return Ratio::Undefined(UndefinedReason::ZeroDenominator);
    }
    let value = numerator / denominator;
    if value.is_finite() {
        Ratio::Defined(value)
    } else {
        Ratio::Undefined(UndefinedReason::ZeroDenominator)
    }
}

/// Relative latency increase of `candidate_mean` over `baseline_mean`, in percent
pub fn overhead_pct(baseline_mean: f64, candidate_mean: f64) -> Ratio {
    ratio("overhead_pct", candidate_mean - baseline_mean, baseline_mean).map(|r| r * 100.0)
}

/// Efficiency of a compound latency against a reference latency, in percent
pub fn efficiency_pct(reference_mean: f64, compound_mean: f64) -> Ratio {
    ratio(
        "efficiency_pct",
        compound_mean - reference_mean,
        reference_mean,
    )
    .map(|r| (1.0 - r) * 100.0)
}

/// One candidate-versus-baseline comparison at a shared configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub baseline: Pattern,
    pub candidate: Pattern,
    pub key: ConfigKey,
    pub baseline_mean_ms: f64,
    pub candidate_mean_ms: f64,
    pub overhead_pct: Ratio,
    /// Multiple of the baseline mean the candidate is expected to cost
    pub reference_multiplier: f64,
    pub efficiency_pct: Ratio,
}

/// Comparisons of one or more candidates against a baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparisons {
    pub results: Vec<ComparisonResult>,
    /// Keys present in only one of the compared tables
    pub skipped_configurations: usize,
}

/// Compare `candidate` against `baseline` at every configuration both share
pub fn compare_tables(
    baseline: Pattern,
    baseline_table: &SummaryTable,
    candidate: Pattern,
    candidate_table: &SummaryTable,
) -> Comparisons {
    let reference_multiplier = candidate.hop_multiplier() / baseline.hop_multiplier();
    let mut comparisons = Comparisons::default();

    for (key, candidate_summary) in candidate_table {
        let Some(baseline_summary) = baseline_table.get(key) else {
            debug!(
                "{}",
                AnalysisError::IncomparableConfiguration {
                    baseline,
                    candidate,
                    key: *key,
                }
            );
            comparisons.skipped_configurations += 1;
            continue;
        };

        comparisons.results.push(ComparisonResult {
            baseline,
            candidate,
            key: *key,
            baseline_mean_ms: baseline_summary.mean,
            candidate_mean_ms: candidate_summary.mean,
            overhead_pct: overhead_pct(baseline_summary.mean, candidate_summary.mean),
            reference_multiplier,
            efficiency_pct: efficiency_pct(
                baseline_summary.mean * reference_multiplier,
                candidate_summary.mean,
            ),
        });
    }

    let baseline_only = baseline_table
        .keys()
        .filter(|key| !candidate_table.contains_key(key))
        .count();
    comparisons.skipped_configurations += baseline_only;

    comparisons
}

/// Compare every non-baseline pattern against `baseline`
///
/// Results are ordered by candidate name, then configuration key.
pub fn compare_patterns(tables: &BTreeMap<Pattern, SummaryTable>, baseline: Pattern) -> Comparisons {
    let Some(baseline_table) = tables.get(&baseline) else {
        warn!("Baseline pattern {} has no data, skipping comparisons", baseline);
        return Comparisons::default();
    };

    let mut all = Comparisons::default();
    for (&candidate, candidate_table) in tables {
        if candidate == baseline {
            continue;
        }
        let pair = compare_tables(baseline, baseline_table, candidate, candidate_table);
        all.skipped_configurations += pair.skipped_configurations;
        all.results.extend(pair.results);
    }
    all
}

/// Compound pattern pairs compared with each other, as (reference, candidate)
pub const PAIRWISE: [(Pattern, Pattern); 1] = [(Pattern::Sequential, Pattern::TwoHop)];

/// Compare the compound patterns with each other, whatever the baseline
///
/// A pair is skipped when either side has no table.
pub fn compare_pairwise(tables: &BTreeMap<Pattern, SummaryTable>) -> Comparisons {
    let mut all = Comparisons::default();
    for (reference, candidate) in PAIRWISE {
        let (Some(reference_table), Some(candidate_table)) =
            (tables.get(&reference), tables.get(&candidate))
        else {
            debug!("No {} vs {} comparison: a side has no data", candidate, reference);
            continue;
        };
        let pair = compare_tables(reference, reference_table, candidate, candidate_table);
        all.skipped_configurations += pair.skipped_configurations;
        all.results.extend(pair.results);
    }
    all
}

/// Variable a scaling ratio is measured along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAxis {
    PayloadSize,
    WorkerCount,
}

/// How latency grows between the smallest and largest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingResult {
    pub axis: ScalingAxis,
    /// Worker count the payload sweep was taken at, if any
    pub worker_count: Option<u32>,
    pub min_config: u64,
    pub max_config: u64,
    pub config_ratio: Ratio,
    pub latency_ratio: Ratio,
    pub scaling_ratio: Ratio,
}

/// Scaling ratios of one pattern's table along the axis `group_by` sweeps
pub fn scaling(table: &SummaryTable, group_by: GroupBy) -> Vec<ScalingResult> {
    let mut slices: BTreeMap<Option<u32>, Vec<(u64, &DistributionSummary)>> = BTreeMap::new();

    let axis = match group_by {
        GroupBy::WorkerCount => ScalingAxis::WorkerCount,
        GroupBy::PayloadSize | GroupBy::WorkerCountAndPayloadSize => ScalingAxis::PayloadSize,
    };

    for (key, summary) in table {
        match axis {
            ScalingAxis::PayloadSize => {
                if let Some(payload) = key.payload_size {
                    slices
                        .entry(key.worker_count)
                        .or_default()
                        .push((payload, summary));
                }
            }
            ScalingAxis::WorkerCount => {
                if let Some(workers) = key.worker_count {
                    slices
                        .entry(None)
                        .or_default()
                        .push((u64::from(workers), summary));
                }
            }
        }
    }

    slices
        .into_iter()
        .filter_map(|(worker_count, points)| {
            let (min_config, min_summary) = *points.iter().min_by_key(|(c, _)| *c)?;
            let (max_config, max_summary) = *points.iter().max_by_key(|(c, _)| *c)?;

            if min_config == max_config {
                let undefined = Ratio::Undefined(UndefinedReason::SingleConfiguration);
                return Some(ScalingResult {
                    axis,
                    worker_count,
                    min_config,
                    max_config,
                    config_ratio: undefined,
                    latency_ratio: undefined,
                    scaling_ratio: undefined,
                });
            }

            let config_ratio = ratio("config_ratio", max_config as f64, min_config as f64);
            let latency_ratio = ratio("latency_ratio", max_summary.mean, min_summary.mean);
            let scaling_ratio = config_ratio.and_then(|c| {
                latency_ratio.and_then(|l| ratio("scaling_ratio", c, l))
            });

            Some(ScalingResult {
                axis,
                worker_count,
                min_config,
                max_config,
                config_ratio,
                latency_ratio,
                scaling_ratio,
            })
        })
        .collect()
}

/// Position of a pattern when ordered by average latency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRank {
    pub rank: usize,
    pub pattern: Pattern,
    /// Average of the per-configuration means
    pub average_mean_ms: f64,
    /// Overhead of that average against the baseline's average
    pub overhead_pct: Ratio,
}

/// Order patterns by the average of their per-configuration means
pub fn rank_patterns(tables: &BTreeMap<Pattern, SummaryTable>, baseline: Pattern) -> Vec<PatternRank> {
    let average = |table: &SummaryTable| -> Option<f64> {
        if table.is_empty() {
            return None;
        }
        Some(table.values().map(|s| s.mean).sum::<f64>() / table.len() as f64)
    };

    let baseline_average = tables.get(&baseline).and_then(average);

    let mut averages: Vec<(Pattern, f64)> = tables
        .iter()
        .filter_map(|(&pattern, table)| average(table).map(|avg| (pattern, avg)))
        .collect();
    averages.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    averages
        .into_iter()
        .enumerate()
        .map(|(i, (pattern, average_mean_ms))| PatternRank {
            rank: i + 1,
            pattern,
            average_mean_ms,
            overhead_pct: match baseline_average {
                Some(base) => overhead_pct(base, average_mean_ms),
                None => Ratio::Undefined(UndefinedReason::MissingInput),
            },
        })
        .collect()
}
