//! Core data types for the backtest engine.

use crate::error::{FaberError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A single observation of a price series: one closing price per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    /// Create a new price point.
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// A validated, time-ordered series of closing prices (monthly cadence).
///
/// Construction rejects the contract violations the engine is not expected to
/// tolerate: empty input, timestamps out of order, duplicate timestamps.
/// Anything that passes construction is safe to backtest; undefined values
/// downstream (short history, zero prices) are handled by arithmetic, not by
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Create a series, failing fast on ordering violations.
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(FaberError::EmptySeries);
        }

        for (i, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(FaberError::DuplicateTimestamp {
                    timestamp: pair[1].timestamp,
                });
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(FaberError::UnsortedTimestamps { index: i + 1 });
            }
        }

        Ok(Self { points })
    }

    /// Construct from points already known to be sorted and deduplicated
    /// (internal producers such as the monthly resampler).
    pub(crate) fn from_sorted(points: Vec<PricePoint>) -> Self {
        debug_assert!(points
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        Self { points }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no observations (never true for a constructed series).
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All observations in timestamp order.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Closing prices in timestamp order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Timestamps in order.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// First observation.
    pub fn first(&self) -> &PricePoint {
        &self.points[0]
    }

    /// Last observation.
    pub fn last(&self) -> &PricePoint {
        &self.points[self.points.len() - 1]
    }

    /// Covered time range.
    pub fn date_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.first().timestamp, self.last().timestamp)
    }

    /// SHA256 checksum of the series content, for cache keys and result
    /// provenance. Identical content yields an identical checksum.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for point in &self.points {
            hasher.update(point.timestamp.timestamp_millis().to_le_bytes());
            hasher.update(point.close.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Trade event observed at a given month.
///
/// The event is recorded at the month in which the signal crossing is
/// observed; the position change takes effect the following month. `Enter`
/// and `Exit` correspond to position deltas of +1 and -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TradeEvent {
    /// Signal flipped long; invested from next month.
    Enter,
    /// Signal flipped flat; in cash from next month.
    Exit,
    /// No change.
    #[default]
    Hold,
}

impl TradeEvent {
    /// Position delta this event encodes.
    pub fn delta(&self) -> i8 {
        match self {
            TradeEvent::Enter => 1,
            TradeEvent::Exit => -1,
            TradeEvent::Hold => 0,
        }
    }

    /// Map a position delta back to an event. Deltas outside {-1, 0, 1}
    /// cannot occur for a binary position.
    pub fn from_delta(delta: i8) -> Self {
        match delta {
            1 => TradeEvent::Enter,
            -1 => TradeEvent::Exit,
            _ => TradeEvent::Hold,
        }
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeEvent::Enter => write!(f, "ENTER"),
            TradeEvent::Exit => write!(f, "EXIT"),
            TradeEvent::Hold => write!(f, "HOLD"),
        }
    }
}
