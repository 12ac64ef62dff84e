use crate::error::AnalysisError;
use crate::loader::DataSource;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Latency Analysis - aggregate and compare communication benchmark results
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Communication patterns to analyze (space-separated: direct, sequential, twohop, or all)
    #[clap(short = 'p', long, value_enum, default_values_t = vec![Pattern::All], help_heading = "Core Options", num_args = 1..)]
    pub patterns: Vec<Pattern>,

    /// Directory holding the benchmark CSV files (flat or per-pattern sweep layout)
    #[clap(short = 'r', long, default_value = crate::defaults::RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Explicit CSV files to load instead of scanning the results directory
    #[clap(short = 'f', long, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Dimensions used to group measurements into distributions
    #[clap(short = 'g', long, value_enum, default_value_t = GroupBy::PayloadSize)]
    pub group_by: GroupBy,

    /// Percentiles to calculate for every distribution
    #[clap(long, num_args = 1.., default_values_t = crate::defaults::PERCENTILES.to_vec())]
    pub percentiles: Vec<f64>,

    /// Pattern that overhead and efficiency are measured against
    #[clap(long, value_enum, default_value_t = Pattern::Direct)]
    pub baseline: Pattern,

    /// Output file for the analysis report (JSON format)
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Also write a flat CSV table of every distribution summary
    #[clap(long)]
    pub summary_csv: Option<PathBuf>,

    /// Write log output to this file in addition to the console
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Skip the console summary
    #[clap(short = 'q', long, default_value_t = false)]
    pub quiet: bool,
}

/// Communication patterns under test
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Single hop between two workers
    #[clap(name = "direct")]
    Direct,

    /// Two sequential round-trips
    #[clap(name = "sequential")]
    Sequential,

    /// Pipelined two-stage relay
    #[clap(name = "twohop")]
    #[value(alias = "two-hop")]
    TwoHop,

    /// All available patterns
    #[clap(name = "all")]
    All,
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Pattern::Direct),
            "sequential" => Ok(Pattern::Sequential),
            "twohop" | "two-hop" | "two_hop" => Ok(Pattern::TwoHop),
            "all" => Ok(Pattern::All),
            other => Err(AnalysisError::InvalidRequest(format!(
                "unknown pattern '{}'",
                other
            ))),
        }
    }
}

impl Pattern {
    /// The concrete patterns, in name order
    pub const CONCRETE: [Pattern; 3] = [Pattern::Direct, Pattern::Sequential, Pattern::TwoHop];

    /// Lowercase name used in file names, CSV columns and report keys
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Direct => "direct",
            Pattern::Sequential => "sequential",
            Pattern::TwoHop => "twohop",
            Pattern::All => "all",
        }
    }

    /// Theoretical latency multiple of this pattern over a direct hop
    ///
    /// Sequential pays two round-trips and two-hop crosses two links, so both
    /// are expected to cost twice a direct exchange when nothing overlaps.
    pub fn hop_multiplier(&self) -> f64 {
        match self {
            Pattern::Direct | Pattern::All => 1.0,
            Pattern::Sequential | Pattern::TwoHop => 2.0,
        }
    }

    /// Expand the "All" variant to all concrete patterns, dropping duplicates
    pub fn expand_all(patterns: Vec<Pattern>) -> Vec<Pattern> {
        if patterns.contains(&Pattern::All) {
            return Pattern::CONCRETE.to_vec();
        }
        let mut expanded = patterns;
        expanded.sort();
        expanded.dedup();
        expanded
    }
}

/// Dimensions a distribution is keyed on
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One distribution per payload size, pooling every worker count
    #[clap(name = "payload")]
    PayloadSize,

    /// One distribution per worker count, pooling every payload size
    #[clap(name = "workers")]
    WorkerCount,

    /// One distribution per (worker count, payload size) pair
    #[clap(name = "workers-payload")]
    WorkerCountAndPayloadSize,
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupBy::PayloadSize => write!(f, "payload size"),
            GroupBy::WorkerCount => write!(f, "worker count"),
            GroupBy::WorkerCountAndPayloadSize => write!(f, "worker count and payload size"),
        }
    }
}

/// Configuration for one analysis run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub patterns: Vec<Pattern>,
    pub source: DataSource,
    pub group_by: GroupBy,
    pub percentiles: Vec<f64>,
    pub baseline: Pattern,
}

impl From<&Args> for AnalysisConfig {
    fn from(args: &Args) -> Self {
        let source = if args.files.is_empty() {
            DataSource::Directory(args.results_dir.clone())
        } else {
            DataSource::Files(args.files.clone())
        };

        Self {
            patterns: Pattern::expand_all(args.patterns.clone()),
            source,
            group_by: args.group_by,
            percentiles: args.percentiles.clone(),
            baseline: args.baseline,
        }
    }
}

impl AnalysisConfig {
    /// Reject requests that cannot produce any statistics at all
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.patterns.is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "no patterns requested".to_string(),
            ));
        }
        if self.baseline == Pattern::All {
            return Err(AnalysisError::InvalidRequest(
                "baseline must be a single pattern".to_string(),
            ));
        }
        if let DataSource::Files(files) = &self.source {
            if files.is_empty() {
                return Err(AnalysisError::InvalidRequest(
                    "no data source configured".to_string(),
                ));
            }
        }
        crate::utils::validate_percentiles(&self.percentiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_display_and_parse() {
        assert_eq!(Pattern::Direct.to_string(), "direct");
        assert_eq!(Pattern::Sequential.to_string(), "sequential");
        assert_eq!(Pattern::TwoHop.to_string(), "twohop");

        assert_eq!("Direct".parse::<Pattern>().unwrap(), Pattern::Direct);
        assert_eq!(" two-hop ".parse::<Pattern>().unwrap(), Pattern::TwoHop);
        assert_eq!("two_hop".parse::<Pattern>().unwrap(), Pattern::TwoHop);
        assert!("ring".parse::<Pattern>().is_err());
    }

    #[test]
    fn test_pattern_expand_all() {
        assert_eq!(
            Pattern::expand_all(vec![Pattern::All]),
            Pattern::CONCRETE.to_vec()
        );
        assert_eq!(
            Pattern::expand_all(vec![Pattern::TwoHop, Pattern::Direct, Pattern::TwoHop]),
            vec![Pattern::Direct, Pattern::TwoHop]
        );
        assert_eq!(
            Pattern::expand_all(vec![Pattern::Sequential, Pattern::All]),
            Pattern::CONCRETE.to_vec()
        );
    }

    #[test]
    fn test_pattern_order_is_by_name() {
        let mut names: Vec<&str> = Pattern::CONCRETE.iter().map(|p| p.name()).collect();
        names.sort();
        let ordered: Vec<&str> = Pattern::CONCRETE.iter().map(|p| p.name()).collect();
        assert_eq!(names, ordered);
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "latency-analysis",
            "-p",
            "direct",
            "twohop",
            "-g",
            "workers-payload",
            "--percentiles",
            "50",
            "99.9",
        ]);
        let config = AnalysisConfig::from(&args);

        assert_eq!(config.patterns, vec![Pattern::Direct, Pattern::TwoHop]);
        assert_eq!(config.group_by, GroupBy::WorkerCountAndPayloadSize);
        assert_eq!(config.percentiles, vec![50.0, 99.9]);
        assert_eq!(config.baseline, Pattern::Direct);
        assert!(matches!(config.source, DataSource::Directory(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_requests() {
        let mut config = AnalysisConfig {
            patterns: vec![Pattern::Direct],
            source: DataSource::Files(Vec::new()),
            group_by: GroupBy::PayloadSize,
            percentiles: vec![50.0],
            baseline: Pattern::Direct,
        };
        assert!(config.validate().is_err());

        config.source = DataSource::Directory(PathBuf::from("results"));
        assert!(config.validate().is_ok());

        config.percentiles = vec![101.0];
        assert!(config.validate().is_err());

        config.percentiles = vec![50.0];
        config.patterns.clear();
        assert!(config.validate().is_err());
    }
}
