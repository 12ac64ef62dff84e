use crate::cli::GroupBy;
use crate::comparison::{ratio, Ratio, UndefinedReason};
use crate::error::AnalysisError;
use crate::record::{ConfigKey, MeasurementRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Distribution summaries of one pattern, ordered by configuration key
pub type SummaryTable = BTreeMap<ConfigKey, DistributionSummary>;

/// Percentile value pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_ms: f64,
}

/// Latency distribution of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    /// Ascending by percentile
    pub percentiles: Vec<PercentileValue>,
}

impl DistributionSummary {
    /// Summarize a set of latencies; `None` when no finite value remains
    ///
    /// NaN and infinite values are discarded. Values are sorted before
    /// anything is summed, so the result does not depend on the order the
    /// latencies arrived in.
    pub fn from_latencies(mut latencies: Vec<f64>, percentiles: &[f64]) -> Option<Self> {
        let before = latencies.len();
        latencies.retain(|v| v.is_finite());
        if latencies.len() < before {
            debug!("Discarded {} non-finite latencies", before - latencies.len());
        }
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_by(|a, b| a.total_cmp(b));

        let count = latencies.len();
        let min = latencies[0];
        let max = latencies[count - 1];
        let sum: f64 = latencies.iter().sum();
        let mean = (sum / count as f64).clamp(min, max);

        // Unbiased sample deviation; a single observation has none.
        let stddev = if count > 1 {
            let squares: f64 = latencies.iter().map(|x| (x - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        let percentiles = normalize_percentiles(percentiles)
            .into_iter()
            .map(|p| PercentileValue {
                percentile: p,
                value_ms: value_at_rank(&latencies, p),
            })
            .collect();

        Some(Self {
            count,
            mean,
            median: value_at_rank(&latencies, 50.0),
            stddev,
            min,
            max,
            percentiles,
        })
    }

    /// Value of a requested percentile
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|v| v.percentile == p)
            .map(|v| v.value_ms)
    }
}

/// Nearest-rank percentile of an ascending slice; `None` when it is empty
///
/// The value at 1-based rank `ceil(p * L / 100)`, clamped to `[1, L]`.
/// `p = 0` is the minimum and `p = 100` the maximum.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(value_at_rank(sorted, p))
}

// `sorted` must be non-empty.
fn value_at_rank(sorted: &[f64], p: f64) -> f64 {
    let len = sorted.len();
    let rank = (p * len as f64 / 100.0).ceil();
    let rank = if rank.is_nan() {
        1
    } else {
        (rank as usize).clamp(1, len)
    };
    sorted[rank - 1]
}

/// Sort and deduplicate a percentile request
pub fn normalize_percentiles(percentiles: &[f64]) -> Vec<f64> {
    let mut normalized: Vec<f64> = percentiles.iter().copied().filter(|p| p.is_finite()).collect();
    normalized.sort_by(|a, b| a.total_cmp(b));
    normalized.dedup();
    normalized
}

/// Groups records by configuration and summarizes every group
#[derive(Debug, Clone)]
pub struct Aggregator {
    group_by: GroupBy,
    percentiles: Vec<f64>,
}

impl Aggregator {
    pub fn new(group_by: GroupBy, percentiles: &[f64]) -> Self {
        Self {
            group_by,
            percentiles: normalize_percentiles(percentiles),
        }
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    /// Summarize the latencies of one configuration
    pub fn summarize(
        &self,
        key: ConfigKey,
        latencies: Vec<f64>,
    ) -> Result<DistributionSummary, AnalysisError> {
        DistributionSummary::from_latencies(latencies, &self.percentiles)
            .ok_or(AnalysisError::EmptyGroup { key })
    }

    /// Summarize every successful latency of `records` as one distribution
    pub fn summarize_all(
        &self,
        records: &[MeasurementRecord],
    ) -> Result<DistributionSummary, AnalysisError> {
        let latencies = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.latency_ms)
            .collect();
        self.summarize(ConfigKey::default(), latencies)
    }

    /// Build one summary per configuration key
    ///
    /// Failed records are ignored. Keys without a successful observation do
    /// not appear in the table.
    pub fn aggregate(&self, records: &[MeasurementRecord]) -> SummaryTable {
        let mut groups: BTreeMap<ConfigKey, Vec<f64>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.success) {
            groups
                .entry(ConfigKey::for_record(record, self.group_by))
                .or_default()
                .push(record.latency_ms);
        }

        let mut table = SummaryTable::new();
        for (key, latencies) in groups {
            match self.summarize(key, latencies) {
                Ok(summary) => {
                    table.insert(key, summary);
                }
                Err(e) => debug!("{}", e),
            }
        }
        table
    }
}

/// Request rate and bandwidth implied by a configuration's mean latency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputEstimate {
    pub requests_per_sec: Ratio,
    pub data_mb_per_sec: Ratio,
}

/// Estimate serial throughput from the mean latency of `summary`
pub fn throughput_estimate(key: &ConfigKey, summary: &DistributionSummary) -> ThroughputEstimate {
    let requests_per_sec = ratio("requests_per_sec", 1000.0, summary.mean);
    let data_mb_per_sec = match key.payload_size {
        Some(payload) => requests_per_sec.map(|rps| payload as f64 * rps / (1024.0 * 1024.0)),
        None => Ratio::Undefined(UndefinedReason::MissingInput),
    };

    ThroughputEstimate {
        requests_per_sec,
        data_mb_per_sec,
    }
}

/// Pearson correlation between payload size and latency
pub fn payload_latency_correlation(records: &[MeasurementRecord]) -> Ratio {
    let points: Vec<(f64, f64)> = records
        .iter()
        .filter(|r| r.success)
        .map(|r| (r.payload_size as f64, r.latency_ms))
        .collect();
    if points.len() < 2 {
        return Ratio::Undefined(UndefinedReason::MissingInput);
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    ratio("correlation", sxy, (sxx * syy).sqrt()).map(|r| r.clamp(-1.0, 1.0))
}
