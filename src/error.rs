//! Error types for the backtest engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for the backtest engine.
///
/// Contract violations (empty, unsorted or duplicated input) fail fast at the
/// boundary. Insufficient history and degenerate prices are not errors: they
/// flow through the arithmetic as undefined values instead.
#[derive(Error, Debug)]
pub enum FaberError {
    #[error("Price series is empty")]
    EmptySeries,

    #[error("Price series timestamps are not strictly increasing at index {index}")]
    UnsortedTimestamps { index: usize },

    #[error("Duplicate timestamp in price series: {timestamp}")]
    DuplicateTimestamp { timestamp: DateTime<Utc> },

    #[error("SMA window must be at least 2, got {window}")]
    InvalidWindow { window: usize },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for backtest operations.
pub type Result<T> = std::result::Result<T, FaberError>;
