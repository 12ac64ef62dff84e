//! # Analysis Error Taxonomy
//!
//! Failures are scoped to the smallest unit they affect. A bad row, a missing
//! pattern, an empty group, an unmatched configuration or a zero denominator
//! is logged and counted by the component that hit it; only an invalid
//! request or an output failure stops a run.

use crate::cli::Pattern;
use crate::record::ConfigKey;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, aggregating or comparing measurements
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No input files exist for a requested pattern
    #[error("no data for {pattern} pattern under {location:?}")]
    SourceNotFound { pattern: Pattern, location: PathBuf },

    /// One CSV row could not be turned into a measurement record
    #[error("{path:?} line {line}: {reason}")]
    RowParse {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// An aggregation key has no successful observations
    #[error("no successful observations for {key}")]
    EmptyGroup { key: ConfigKey },

    /// Two patterns do not share a configuration key
    #[error("{candidate} has no {baseline} counterpart at {key}")]
    IncomparableConfiguration {
        baseline: Pattern,
        candidate: Pattern,
        key: ConfigKey,
    },

    /// A derived ratio has a zero or missing denominator
    #[error("{metric} is undefined: denominator is zero or missing")]
    DegenerateDenominator { metric: &'static str },

    /// The analysis request itself cannot be served
    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Whether this error should stop the whole run
    ///
    /// Everything else is local to one file, row, configuration or pattern.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::SourceNotFound {
            pattern: Pattern::TwoHop,
            location: PathBuf::from("csvfiles"),
        };
        assert_eq!(err.to_string(), "no data for twohop pattern under \"csvfiles\"");

        let err = AnalysisError::IncomparableConfiguration {
            baseline: Pattern::Direct,
            candidate: Pattern::Sequential,
            key: ConfigKey::payload(64),
        };
        assert_eq!(
            err.to_string(),
            "sequential has no direct counterpart at payload=64"
        );
    }

    #[test]
    fn test_fatality() {
        assert!(AnalysisError::InvalidRequest("x".into()).is_fatal());
        assert!(!AnalysisError::EmptyGroup {
            key: ConfigKey::payload(16)
        }
        .is_fatal());
        assert!(!AnalysisError::DegenerateDenominator { metric: "overhead_pct" }.is_fatal());
    }
}
