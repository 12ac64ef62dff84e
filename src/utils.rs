//! # Utility Functions and Helper Module
//!
//! Formatting, table and validation helpers shared by the report renderer
//! and the configuration layer.
//!
//! ## Usage Examples
//!
//! ```rust
//! use latency_analysis::utils::*;
//!
//! assert_eq!(format_latency_ms(1.5), "1.50ms");
//! assert_eq!(format_bytes(1536), "1.50 KB");
//!
//! validate_percentiles(&[50.0, 95.0, 99.0])?; // OK
//! # Ok::<(), latency_analysis::error::AnalysisError>(())
//! ```

use crate::comparison::Ratio;
use crate::error::AnalysisError;
use uuid::Uuid;

/// Generate a unique identifier for an analysis run
///
/// Stored in the report metadata so JSON and CSV outputs of the same run can
/// be matched up later.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a latency given in milliseconds
///
/// ## Unit Selection
///
/// - **Microseconds**: < 1 ms (e.g., "850.00μs")
/// - **Milliseconds**: < 1,000 ms (e.g., "25.75ms")
/// - **Seconds**: otherwise (e.g., "1.50s")
///
/// ## Examples
///
/// ```rust
/// # use latency_analysis::utils::format_latency_ms;
/// assert_eq!(format_latency_ms(0.85), "850.00μs");
/// assert_eq!(format_latency_ms(25.75), "25.75ms");
/// assert_eq!(format_latency_ms(1500.0), "1.50s");
/// ```
pub fn format_latency_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.2}μs", ms * 1_000.0)
    } else if ms < 1_000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1_000.0)
    }
}

/// Format bytes in a human-readable way
///
/// Uses binary (1024-based) scaling:
/// - Bytes: < 1024 (e.g., "500 B")
/// - Kilobytes: < 1024² (e.g., "1.50 KB")
/// - Megabytes: < 1024³ (e.g., "2.25 MB")
/// - Gigabytes: ≥ 1024³ (e.g., "1.75 GB")
///
/// ## Examples
///
/// ```rust
/// # use latency_analysis::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// assert_eq!(format_bytes(2621440), "2.50 MB");
/// ```
pub fn format_bytes(bytes: usize) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a percentage ratio with one decimal place, or "n/a"
///
/// `signed` prefixes positive values with "+", which reads better for
/// overheads.
pub fn format_percentage(value: &Ratio, signed: bool) -> String {
    match value.value() {
        Some(v) if signed => format!("{:+.1}%", v),
        Some(v) => format!("{:.1}%", v),
        None => "n/a".to_string(),
    }
}

/// Validate a percentile request
///
/// Every percentile must be a finite number in `[0, 100]`.
pub fn validate_percentiles(percentiles: &[f64]) -> Result<(), AnalysisError> {
    for &p in percentiles {
        if !p.is_finite() || !(0.0..=100.0).contains(&p) {
            return Err(AnalysisError::InvalidRequest(format!(
                "percentile {} is outside [0, 100]",
                p
            )));
        }
    }
    Ok(())
}

/// Format a table row
///
/// Columns are left-aligned, padded to their width and separated by pipes.
///
/// ## Examples
///
/// ```rust
/// # use latency_analysis::utils::format_table_row;
/// assert_eq!(format_table_row(&["direct", "1.00ms"], &[8, 6]), "| direct   | 1.00ms |\n");
/// ```
pub fn format_table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row.push('\n');
    row
}

/// Format a table separator
///
/// ```text
/// +----------------+-----------+
/// | Pattern        | Overhead  |
/// +----------------+-----------+
/// ```
pub fn format_table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}
