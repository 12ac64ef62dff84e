//! # Measurement Loader
//!
//! Turns benchmark CSV files into [`MeasurementRecord`]s for one pattern.
//!
//! ## Directory Layouts
//!
//! A results directory is scanned in one of two layouts:
//!
//! - **Sweep**: `<root>/<pattern>/N<workers>/*.csv`, one directory per worker
//!   count holding one CSV per job shard. CSV files placed directly under
//!   `<root>/<pattern>/` carry no worker count.
//! - **Flat**: `<root>/benchmark_results_<pattern>.csv`.
//!
//! The sweep layout wins when both are present. Every shard of a
//! configuration lands in the same record pool, so statistics are always
//! computed over the concatenated data and never per file.
//!
//! ## Row Handling
//!
//! Columns are matched by header name. `PayloadSize`, `LatencyMs` and
//! `Success` are required; `Pattern` is optional and defaults to the pattern
//! being loaded. Failed rows (`Success = 0`) are counted but never returned.
//! Malformed rows are dropped and counted; they do not abort the file.

use crate::cli::Pattern;
use crate::comparison::{ratio, Ratio};
use crate::error::AnalysisError;
use crate::record::MeasurementRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PAYLOAD_COLUMN: &str = "PayloadSize";
const LATENCY_COLUMN: &str = "LatencyMs";
const SUCCESS_COLUMN: &str = "Success";
const REQUIRED_COLUMNS: [&str; 3] = [PAYLOAD_COLUMN, LATENCY_COLUMN, SUCCESS_COLUMN];

/// Where measurement files come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// A results directory in sweep or flat layout
    Directory(PathBuf),
    /// Explicit CSV files, rows attributed through the `Pattern` column
    ///
    /// Rows without a pattern are attributed only when a single pattern is
    /// requested.
    Files(Vec<PathBuf>),
}

impl DataSource {
    fn location(&self) -> PathBuf {
        match self {
            DataSource::Directory(root) => root.clone(),
            DataSource::Files(files) => files.first().cloned().unwrap_or_default(),
        }
    }
}

/// One CSV file and what its location says about its rows
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub path: PathBuf,
    pub worker_count: Option<u32>,
    /// Pattern credited to rows with no `Pattern` value; `None` leaves them unattributed
    pub default_pattern: Option<Pattern>,
}

/// A file that was found but could not be read as measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Row accounting for one pattern load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    pub files_read: usize,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub dropped_rows: usize,
    pub foreign_pattern_rows: usize,
    pub skipped_files: Vec<SkippedFile>,
}

impl LoadStats {
    /// Share of well-formed rows for this pattern that succeeded
    pub fn success_rate_pct(&self) -> Ratio {
        let attempted = self.successful_rows + self.failed_rows;
        ratio(
            "success_rate_pct",
            self.successful_rows as f64 * 100.0,
            attempted as f64,
        )
    }
}

/// Successful records of one pattern plus the accounting that produced them
#[derive(Debug, Clone)]
pub struct PatternLoad {
    pub pattern: Pattern,
    pub records: Vec<MeasurementRecord>,
    pub stats: LoadStats,
}

impl PatternLoad {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            records: Vec::new(),
            stats: LoadStats::default(),
        }
    }

    fn absorb(&mut self, shard: PatternLoad) {
        self.records.extend(shard.records);
        let stats = shard.stats;
        self.stats.files_read += stats.files_read;
        self.stats.total_rows += stats.total_rows;
        self.stats.successful_rows += stats.successful_rows;
        self.stats.failed_rows += stats.failed_rows;
        self.stats.dropped_rows += stats.dropped_rows;
        self.stats.foreign_pattern_rows += stats.foreign_pattern_rows;
        self.stats.skipped_files.extend(stats.skipped_files);
    }

    fn skip(&mut self, file: &InputFile, error: AnalysisError) {
        warn!("Skipping {:?}: {}", file.path, error);
        self.stats.skipped_files.push(SkippedFile {
            path: file.path.clone(),
            reason: error.to_string(),
        });
    }
}

/// Raw CSV row, matched to columns by header name
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "PayloadSize")]
    payload_size: u64,
    #[serde(rename = "LatencyMs")]
    latency_ms: Option<f64>,
    #[serde(rename = "Success")]
    success: u8,
    #[serde(rename = "Pattern", default)]
    pattern: Option<String>,
}

impl CsvRow {
    /// `Ok(None)` for a valid row that names no pattern when the file has no default
    fn into_record(
        self,
        default_pattern: Option<Pattern>,
        worker_count: Option<u32>,
    ) -> Result<Option<MeasurementRecord>, String> {
        let pattern = match self.pattern.as_deref() {
            None | Some("") => default_pattern,
            Some(name) => Some(name.parse::<Pattern>().map_err(|e| e.to_string())?),
        };
        if pattern == Some(Pattern::All) {
            return Err("pattern 'all' is not a measured pattern".to_string());
        }

        let success = match self.success {
            0 => false,
            1 => true,
            other => return Err(format!("Success must be 0 or 1, got {}", other)),
        };

        let latency_ms = match self.latency_ms {
            Some(value) if value.is_finite() && value >= 0.0 => value,
            Some(value) => return Err(format!("invalid latency {}", value)),
            // Failed requests may leave the latency blank.
            None if !success => 0.0,
            None => return Err("missing latency on a successful row".to_string()),
        };

        Ok(pattern.map(|pattern| MeasurementRecord {
            pattern,
            worker_count,
            payload_size: self.payload_size,
            latency_ms,
            success,
        }))
    }
}

/// Discovers and parses measurement files for a data source
#[derive(Debug, Clone)]
pub struct Loader {
    source: DataSource,
    requested: Vec<Pattern>,
}

impl Loader {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            requested: Vec::new(),
        }
    }

    /// Declare every pattern this run will load
    ///
    /// Explicit files are shared by all requested patterns, so their
    /// unlabeled rows can only be credited when exactly one is requested.
    pub fn with_patterns(mut self, patterns: &[Pattern]) -> Self {
        self.requested = Pattern::expand_all(patterns.to_vec());
        self
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// List the files holding measurements for `pattern`, in path order
    pub fn discover(&self, pattern: Pattern) -> Result<Vec<InputFile>, AnalysisError> {
        let files = match &self.source {
            DataSource::Directory(root) => discover_in_directory(root, pattern)?,
            DataSource::Files(paths) => {
                let default_pattern = (self.requested == [pattern]).then_some(pattern);
                let mut files = Vec::new();
                for path in paths {
                    if path.is_file() {
                        files.push(InputFile {
                            path: path.clone(),
                            worker_count: None,
                            default_pattern,
                        });
                    } else {
                        info!("Input file {:?} not found, skipping", path);
                    }
                }
                files
            }
        };

        if files.is_empty() {
            return Err(AnalysisError::SourceNotFound {
                pattern,
                location: self.source.location(),
            });
        }
        Ok(files)
    }

    /// Load every successful measurement for `pattern`
    ///
    /// Returns `SourceNotFound` when the pattern has no files at all. Files
    /// that exist but cannot be parsed are listed in the load statistics and
    /// contribute no rows.
    pub fn load(&self, pattern: Pattern) -> Result<PatternLoad, AnalysisError> {
        let files = self.discover(pattern)?;
        let mut load = PatternLoad::new(pattern);

        for file in &files {
            match File::open(&file.path) {
                Ok(handle) => read_shard(handle, file, &mut load),
                Err(source) => load.skip(
                    file,
                    AnalysisError::Io {
                        path: file.path.clone(),
                        source,
                    },
                ),
            }
        }

        info!(
            "Loaded {} successful measurements for {} pattern ({} failed, {} dropped, {} files)",
            load.stats.successful_rows,
            pattern,
            load.stats.failed_rows,
            load.stats.dropped_rows,
            load.stats.files_read
        );
        Ok(load)
    }
}

/// Read one file into a scratch load and merge it only if the whole file parsed
fn read_shard<R: Read>(input: R, file: &InputFile, load: &mut PatternLoad) {
    let mut shard = PatternLoad::new(load.pattern);
    match read_csv(input, file, &mut shard) {
        Ok(()) => {
            load.absorb(shard);
            load.stats.files_read += 1;
        }
        Err(e) => load.skip(file, e),
    }
}

/// Parse one CSV stream into `load`, keeping the rows of `load.pattern`
///
/// Rows are appended to the existing pool, so several shards can be read
/// into the same load before aggregation.
pub fn read_csv<R: Read>(
    input: R,
    file: &InputFile,
    load: &mut PatternLoad,
) -> Result<(), AnalysisError> {
    let origin = file.path.as_path();
    let csv_error = |source: csv::Error| AnalysisError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_error)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(AnalysisError::RowParse {
                path: origin.to_path_buf(),
                line: 1,
                reason: format!("missing required column {}", column),
            });
        }
    }

    let mut unattributed = 0usize;
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(csv_error(e)),
            Err(e) => {
                load.stats.total_rows += 1;
                load.stats.dropped_rows += 1;
                debug!("Dropping unreadable row in {:?}: {}", origin, e);
                continue;
            }
        };
        load.stats.total_rows += 1;
        let line = row.position().map_or(0, |p| p.line());

        let parsed = row
            .deserialize::<CsvRow>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(|raw| raw.into_record(file.default_pattern, file.worker_count));

        let record = match parsed {
            Ok(Some(record)) => record,
            Ok(None) => {
                unattributed += 1;
                load.stats.foreign_pattern_rows += 1;
                continue;
            }
            Err(reason) => {
                let err = AnalysisError::RowParse {
                    path: origin.to_path_buf(),
                    line,
                    reason,
                };
                debug!("Dropping row: {}", err);
                load.stats.dropped_rows += 1;
                continue;
            }
        };

        if record.pattern != load.pattern {
            load.stats.foreign_pattern_rows += 1;
        } else if !record.success {
            load.stats.failed_rows += 1;
        } else {
            load.stats.successful_rows += 1;
            load.records.push(record);
        }
    }

    if unattributed > 0 {
        warn!(
            "{} rows in {:?} have no Pattern value and several patterns were requested; not counted as {} data",
            unattributed, origin, load.pattern
        );
    }
    Ok(())
}

fn discover_in_directory(root: &Path, pattern: Pattern) -> Result<Vec<InputFile>, AnalysisError> {
    if !root.is_dir() {
        info!("Results directory {:?} not found - no {} data", root, pattern);
        return Ok(Vec::new());
    }

    let pattern_dir = root.join(pattern.name());
    let mut files = if pattern_dir.is_dir() {
        discover_sweep(&pattern_dir, pattern)?
    } else {
        Vec::new()
    };

    if files.is_empty() {
        let flat = root.join(format!("benchmark_results_{}.csv", pattern.name()));
        if flat.is_file() {
            files.push(InputFile {
                path: flat,
                worker_count: None,
                default_pattern: Some(pattern),
            });
        } else {
            info!("{:?} not found, skipping {} pattern", flat, pattern);
        }
    }

    Ok(files)
}

fn discover_sweep(pattern_dir: &Path, pattern: Pattern) -> Result<Vec<InputFile>, AnalysisError> {
    let mut files = Vec::new();

    for path in sorted_entries(pattern_dir)? {
        if path.is_dir() {
            let worker_count = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_worker_dir);
            match worker_count {
                Some(n) => {
                    for shard in sorted_entries(&path)? {
                        if is_csv(&shard) {
                            files.push(InputFile {
                                path: shard,
                                worker_count: Some(n),
                                default_pattern: Some(pattern),
                            });
                        }
                    }
                }
                None => debug!("Ignoring directory {:?}: not an N<workers> directory", path),
            }
        } else if is_csv(&path) {
            files.push(InputFile {
                path,
                worker_count: None,
                default_pattern: Some(pattern),
            });
        }
    }

    files.sort();
    Ok(files)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    let io_error = |source| AnalysisError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        entries.push(entry.map_err(io_error)?.path());
    }
    entries.sort();
    Ok(entries)
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
}

/// Parse an `N<workers>` directory name
pub fn parse_worker_dir(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('N').or_else(|| name.strip_prefix('n'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn inline_file(default_pattern: Option<Pattern>) -> InputFile {
        InputFile {
            path: PathBuf::from("inline.csv"),
            worker_count: None,
            default_pattern,
        }
    }

    fn load_str(pattern: Pattern, csv: &str) -> PatternLoad {
        let mut load = PatternLoad::new(pattern);
        read_csv(csv.as_bytes(), &inline_file(Some(pattern)), &mut load).unwrap();
        load
    }

    #[test]
    fn test_successful_rows_only() {
        let load = load_str(
            Pattern::Direct,
            "PayloadSize,LatencyMs,Success\n64,1.0,1\n64,2.0,1\n64,3.0,1\n64,100.0,0\n",
        );

        assert_eq!(load.records.len(), 3);
        assert!(load.records.iter().all(|r| r.success));
        assert_eq!(load.stats.total_rows, 4);
        assert_eq!(load.stats.successful_rows, 3);
        assert_eq!(load.stats.failed_rows, 1);
        assert_eq!(load.stats.dropped_rows, 0);
        assert_eq!(load.stats.success_rate_pct().value(), Some(75.0));
    }

    #[test]
    fn test_columns_are_order_independent() {
        let load = load_str(
            Pattern::Sequential,
            "Success, Pattern, LatencyMs, PayloadSize, Extra\n1, sequential, 2.5, 128, x\n",
        );

        assert_eq!(load.records.len(), 1);
        let record = load.records[0];
        assert_eq!(record.pattern, Pattern::Sequential);
        assert_eq!(record.payload_size, 128);
        assert_eq!(record.latency_ms, 2.5);
        assert_eq!(record.worker_count, None);
    }

    #[test]
    fn test_malformed_rows_are_dropped_and_counted() {
        let load = load_str(
            Pattern::Direct,
            "PayloadSize,LatencyMs,Success\n\
             64,abc,1\n\
             64,,1\n\
             64,-1.0,1\n\
             64,NaN,1\n\
             64,1.0,2\n\
             big,1.0,1\n\
             64,1.5,1\n\
             64,,0\n",
        );

        assert_eq!(load.stats.dropped_rows, 6);
        assert_eq!(load.stats.failed_rows, 1);
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].latency_ms, 1.5);
    }

    #[test]
    fn test_pattern_column_defaults_and_filters() {
        let load = load_str(
            Pattern::TwoHop,
            "PayloadSize,LatencyMs,Success,Pattern\n\
             16,1.0,1,\n\
             16,2.0,1,two-hop\n\
             16,3.0,1,direct\n\
             16,4.0,1,ring\n",
        );

        assert_eq!(load.records.len(), 2);
        assert_eq!(load.stats.foreign_pattern_rows, 1);
        assert_eq!(load.stats.dropped_rows, 1);
    }

    #[test]
    fn test_missing_required_column_rejects_file() {
        let mut load = PatternLoad::new(Pattern::Direct);
        let err = read_csv(
            "PayloadSize,Success\n64,1\n".as_bytes(),
            &inline_file(Some(Pattern::Direct)),
            &mut load,
        )
        .unwrap_err();

        assert!(matches!(err, AnalysisError::RowParse { line: 1, .. }));
        assert!(load.records.is_empty());
    }

    #[test]
    fn test_parse_worker_dir() {
        assert_eq!(parse_worker_dir("N8"), Some(8));
        assert_eq!(parse_worker_dir("n16"), Some(16));
        assert_eq!(parse_worker_dir("N0"), None);
        assert_eq!(parse_worker_dir("N"), None);
        assert_eq!(parse_worker_dir("N+4"), None);
        assert_eq!(parse_worker_dir("plots"), None);
    }

    #[test]
    fn test_missing_directory_is_source_not_found() {
        let loader = Loader::new(DataSource::Directory(PathBuf::from(
            "/nonexistent/latency-analysis",
        )));
        let err = loader.load(Pattern::Direct).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::SourceNotFound {
                pattern: Pattern::Direct,
                ..
            }
        ));
    }

    #[test]
    fn test_sweep_discovery() {
        let root = TempDir::new().unwrap();
        let n2 = root.path().join("direct").join("N2");
        let n8 = root.path().join("direct").join("N8");
        fs::create_dir_all(&n2).unwrap();
        fs::create_dir_all(&n8).unwrap();
        fs::create_dir_all(root.path().join("direct").join("plots")).unwrap();
        fs::write(n8.join("benchmark_results_direct_job2.csv"), "").unwrap();
        fs::write(n8.join("benchmark_results_direct_job1.csv"), "").unwrap();
        fs::write(n2.join("benchmark_results_direct_job1.csv"), "").unwrap();
        fs::write(n2.join("notes.txt"), "").unwrap();

        let loader = Loader::new(DataSource::Directory(root.path().to_path_buf()));
        let files = loader.discover(Pattern::Direct).unwrap();

        let workers: Vec<Option<u32>> = files.iter().map(|f| f.worker_count).collect();
        assert_eq!(workers, vec![Some(2), Some(8), Some(8)]);
        assert!(files[1].path.ends_with("benchmark_results_direct_job1.csv"));
        assert!(files[2].path.ends_with("benchmark_results_direct_job2.csv"));

        assert!(loader.discover(Pattern::Sequential).is_err());
    }

    #[test]
    fn test_flat_discovery() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("benchmark_results_sequential.csv"),
            "PayloadSize,LatencyMs,Success\n16,1.0,1\n",
        )
        .unwrap();

        let loader = Loader::new(DataSource::Directory(root.path().to_path_buf()));
        let load = loader.load(Pattern::Sequential).unwrap();
        assert_eq!(load.stats.files_read, 1);
        assert_eq!(load.records.len(), 1);
    }

    #[test]
    fn test_unreadable_file_is_skipped_not_fatal() {
        let root = TempDir::new().unwrap();
        let good = root.path().join("good.csv");
        let bad = root.path().join("bad.csv");
        fs::write(&good, "PayloadSize,LatencyMs,Success\n16,1.0,1\n").unwrap();
        fs::write(&bad, "Size,Latency\n16,1.0\n").unwrap();

        let loader = Loader::new(DataSource::Files(vec![bad.clone(), good]))
            .with_patterns(&[Pattern::Direct]);
        let load = loader.load(Pattern::Direct).unwrap();

        assert_eq!(load.stats.files_read, 1);
        assert_eq!(load.stats.skipped_files.len(), 1);
        assert_eq!(load.stats.skipped_files[0].path, bad);
        assert_eq!(load.records.len(), 1);
    }

    /// Yields its bytes, then fails like a disk read error
    struct FailingReader {
        data: std::io::Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::new(std::io::ErrorKind::Other, "device error")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_file_failing_midway_contributes_no_rows() {
        let file = InputFile {
            path: PathBuf::from("flaky.csv"),
            worker_count: None,
            default_pattern: Some(Pattern::Direct),
        };
        let mut load = load_str(Pattern::Direct, "PayloadSize,LatencyMs,Success\n8,0.5,1\n");

        let reader = FailingReader {
            data: std::io::Cursor::new(
                b"PayloadSize,LatencyMs,Success\n16,1.0,1\n16,2.0,1\n16,3.0,0\n".to_vec(),
            ),
        };
        read_shard(reader, &file, &mut load);

        assert_eq!(load.records.len(), 1);
        assert_eq!(load.stats.successful_rows, 1);
        assert_eq!(load.stats.failed_rows, 0);
        assert_eq!(load.stats.total_rows, 1);
        assert_eq!(load.stats.skipped_files.len(), 1);
        assert_eq!(load.stats.skipped_files[0].path, file.path);
    }

    #[test]
    fn test_unlabeled_rows_need_a_default_pattern() {
        let csv = "PayloadSize,LatencyMs,Success,Pattern\n64,1.0,1,\n64,2.0,1,direct\n64,bad,1,\n";
        let mut load = PatternLoad::new(Pattern::Direct);
        read_csv(csv.as_bytes(), &inline_file(None), &mut load).unwrap();

        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].latency_ms, 2.0);
        assert_eq!(load.stats.foreign_pattern_rows, 1);
        assert_eq!(load.stats.dropped_rows, 1);
    }

    #[test]
    fn test_shared_files_credit_unlabeled_rows_to_a_single_request_only() {
        let root = TempDir::new().unwrap();
        let shared = root.path().join("direct_only.csv");
        fs::write(&shared, "PayloadSize,LatencyMs,Success\n64,1.0,1\n64,2.0,1\n").unwrap();
        let source = DataSource::Files(vec![shared]);

        let single = Loader::new(source.clone()).with_patterns(&[Pattern::Direct]);
        assert_eq!(single.load(Pattern::Direct).unwrap().records.len(), 2);

        let all = Loader::new(source).with_patterns(&[Pattern::All]);
        for pattern in Pattern::CONCRETE {
            let load = all.load(pattern).unwrap();
            assert!(load.records.is_empty());
            assert_eq!(load.stats.foreign_pattern_rows, 2);
        }
    }

    #[test]
    fn test_directory_files_credit_their_own_pattern() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("benchmark_results_twohop.csv"),
            "PayloadSize,LatencyMs,Success\n64,1.0,1\n",
        )
        .unwrap();

        let loader = Loader::new(DataSource::Directory(root.path().to_path_buf()))
            .with_patterns(&[Pattern::All]);
        let files = loader.discover(Pattern::TwoHop).unwrap();
        assert_eq!(files[0].default_pattern, Some(Pattern::TwoHop));
        assert_eq!(loader.load(Pattern::TwoHop).unwrap().records.len(), 1);
    }
}
