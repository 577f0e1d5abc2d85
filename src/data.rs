//! Loading and shaping of price data.
//!
//! The engine consumes a clean monthly [`PriceSeries`]; fetching is an
//! upstream concern. This module covers the boundary work: CSV parsing with
//! flexible headers and date formats, sorting and deduplication with loud
//! warnings, and resampling finer-grained data down to monthly closes.

use crate::error::{FaberError, Result};
use crate::types::{PricePoint, PriceSeries};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// CSV row format with flexible column naming.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "timestamp",
        alias = "Timestamp",
        alias = "time"
    )]
    date: String,
    #[serde(alias = "Close", alias = "Adj Close", alias = "adj_close", alias = "c")]
    close: f64,
}

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string for parsing (e.g., "%Y-%m-%d"). None tries common formats.
    pub date_format: Option<String>,
    /// Whether the CSV has headers.
    pub has_headers: bool,
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Skip invalid rows instead of failing.
    pub skip_invalid: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            has_headers: true,
            delimiter: None,
            skip_invalid: true,
        }
    }
}

/// Detect the CSV delimiter by analyzing the first few lines of the file.
///
/// Tries common delimiters (comma, tab, semicolon, pipe) and returns the one
/// that produces a consistent column count of at least two (date, close).
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let lines: Vec<String> = reader.lines().take(5).map_while(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    let delimiters = [b',', b'\t', b';', b'|'];

    for &delim in &delimiters {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();

        let first_count = counts[0];
        if first_count >= 2 && counts.iter().all(|&c| c == first_count) {
            debug!(
                "Detected delimiter {:?} with {} fields",
                delim as char, first_count
            );
            return Ok(delim);
        }
    }

    Ok(b',')
}

/// Parse a date string with multiple format attempts.
fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    // An explicit format is authoritative: no fallback to guessing.
    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        return NaiveDate::parse_from_str(s, fmt)
            .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()))
            .map_err(FaberError::from);
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y/%m/%d %H:%M:%S",
    ];

    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y"];

    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    // Unix timestamp fallback
    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(FaberError::DataError(format!(
        "Could not parse date: '{}'",
        s
    )))
}

/// Load a closing-price series from a CSV file.
///
/// Rows are sorted by timestamp; duplicate timestamps keep the first
/// occurrence and are reported with a warning. The result is validated as a
/// [`PriceSeries`], so downstream code never sees contract-violating input.
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<PriceSeries> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let file = File::open(path)?;
    let series = read_points(file, delimiter, config)?;

    let (start, end) = series.date_range();
    info!("Loaded {} observations from {} to {}", series.len(), start, end);

    Ok(series)
}

/// Parse a closing-price series from CSV text (used for embedded samples).
pub fn load_csv_from_str(content: &str, config: &DataConfig) -> Result<PriceSeries> {
    let delimiter = config.delimiter.unwrap_or(b',');
    read_points(content.as_bytes(), delimiter, config)
}

fn read_points(
    input: impl std::io::Read,
    delimiter: u8,
    config: &DataConfig,
) -> Result<PriceSeries> {
    let mut reader = ReaderBuilder::new()
        .has_headers(config.has_headers)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input);

    let mut points = Vec::new();
    let mut skipped = 0;
    let mut row_num = 0;

    for result in reader.deserialize() {
        row_num += 1;
        let row: CsvRow = match result {
            Ok(r) => r,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {}: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(FaberError::CsvError(e));
                }
            }
        };

        let timestamp = match parse_datetime(&row.date, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {} due to date parse error: {}", row_num, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(e);
                }
            }
        };

        points.push(PricePoint::new(timestamp, row.close));
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    points.sort_by_key(|p| p.timestamp);

    let before_dedup = points.len();
    points.dedup_by_key(|p| p.timestamp);
    if points.len() < before_dedup {
        warn!(
            "Removed {} duplicate timestamps",
            before_dedup - points.len()
        );
    }

    PriceSeries::new(points)
}

/// Resample a series to monthly cadence: last close per calendar month,
/// stamped at the first day of the month (the convention monthly market data
/// feeds use).
pub fn resample_monthly(series: &PriceSeries) -> PriceSeries {
    let mut buckets: HashMap<i64, PricePoint> = HashMap::new();

    for point in series.points() {
        let key = point.timestamp.year() as i64 * 12 + point.timestamp.month() as i64;
        // Points arrive in timestamp order, so the last write wins the bucket.
        buckets.insert(key, *point);
    }

    let mut points: Vec<PricePoint> = buckets
        .into_values()
        .map(|p| {
            let month_start = NaiveDate::from_ymd_opt(p.timestamp.year(), p.timestamp.month(), 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            PricePoint::new(Utc.from_utc_datetime(&month_start), p.close)
        })
        .collect();

    points.sort_by_key(|p| p.timestamp);
    PriceSeries::from_sorted(points)
}

/// Bundled synthetic monthly index series (1995-2024) for docs and tests.
const SAMPLE_DEMO_CSV: &str = include_str!("../data/samples/DEMO.csv");

/// Available sample data names.
pub fn list_samples() -> Vec<&'static str> {
    vec!["DEMO"]
}

/// Load bundled sample data by name (case-insensitive).
///
/// Sample data is embedded in the binary and requires no external files.
/// `"DEMO"` is a synthetic monthly index series spanning 1995-2024 with two
/// extended drawdown phases.
pub fn load_sample(name: &str) -> Result<PriceSeries> {
    match name.to_uppercase().as_str() {
        "DEMO" => load_csv_from_str(SAMPLE_DEMO_CSV, &DataConfig::default()),
        _ => Err(FaberError::DataError(format!(
            "Unknown sample: '{}'. Available samples: {:?}",
            name,
            list_samples()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_load_csv_from_str() {
        let csv = "date,close\n2020-01-01,100.0\n2020-02-01,101.5\n2020-03-01,99.25\n";
        let series = load_csv_from_str(csv, &DataConfig::default()).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![100.0, 101.5, 99.25]);
        assert_eq!(
            series.first().timestamp,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_header_aliases() {
        let csv = "Date,Adj Close\n2020-01-01,100.0\n2020-02-01,101.5\n";
        let series = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_unordered_rows_are_sorted() {
        let csv = "date,close\n2020-03-01,99.0\n2020-01-01,100.0\n2020-02-01,101.0\n";
        let series = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        assert_eq!(series.closes(), vec![100.0, 101.0, 99.0]);
    }

    #[test]
    fn test_duplicate_rows_keep_first() {
        let csv = "date,close\n2020-01-01,100.0\n2020-01-01,200.0\n2020-02-01,101.0\n";
        let series = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        assert_eq!(series.closes(), vec![100.0, 101.0]);
    }

    #[test]
    fn test_skip_invalid_rows() {
        let csv = "date,close\n2020-01-01,100.0\nnot-a-date,3.0\n2020-02-01,101.0\n";
        let series = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_explicit_date_format_is_authoritative() {
        let csv = "date,close\n31.01.2020,100.0\n29.02.2020,101.0\n";
        let config = DataConfig {
            date_format: Some("%d.%m.%Y".to_string()),
            ..Default::default()
        };
        let series = load_csv_from_str(csv, &config).unwrap();
        assert_eq!(series.len(), 2);

        // Rows not matching the explicit format are not second-guessed.
        let mixed = "date,close\n31.01.2020,100.0\n2020-02-01,101.0\n";
        let series = load_csv_from_str(mixed, &config).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_strict_mode_fails_on_bad_date() {
        let csv = "date,close\nnot-a-date,3.0\n";
        let config = DataConfig {
            skip_invalid: false,
            ..Default::default()
        };
        assert!(load_csv_from_str(csv, &config).is_err());
    }

    #[test]
    fn test_empty_input_is_loud() {
        let result = load_csv_from_str("date,close\n", &DataConfig::default());
        assert!(matches!(result, Err(FaberError::EmptySeries)));
    }

    #[test]
    fn test_resample_monthly_takes_last_close() {
        let csv = "date,close\n\
                   2020-01-02,100.0\n2020-01-15,105.0\n2020-01-31,103.0\n\
                   2020-02-03,104.0\n2020-02-28,108.0\n";
        let daily = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        let monthly = resample_monthly(&daily);

        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly.closes(), vec![103.0, 108.0]);
        assert_eq!(
            monthly.timestamps(),
            vec![
                Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_load_sample() {
        let series = load_sample("demo").unwrap();
        assert!(series.len() >= 300);
        assert!(series.closes().iter().all(|&c| c > 0.0));

        assert!(load_sample("NOPE").is_err());
    }
}
