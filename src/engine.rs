//! Signal generation and backtest execution.
//!
//! The trading rule is Faber's monthly trend filter: hold the asset while the
//! prior month's close sits above its prior-month N-month SMA, hold cash
//! otherwise. The one-month lag between signal and position is the defining
//! causality rule of the engine; every column in the output table is derived
//! from it by pure arithmetic.

use crate::calendar;
use crate::error::{FaberError, Result};
use crate::types::{PriceSeries, TradeEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backtest parameters: the nominal start year and the SMA window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestParams {
    start_year: i32,
    sma_window: usize,
}

impl BacktestParams {
    /// Create parameters, rejecting windows shorter than 2 months.
    pub fn new(start_year: i32, sma_window: usize) -> Result<Self> {
        if sma_window < 2 {
            return Err(FaberError::InvalidWindow { window: sma_window });
        }
        Ok(Self {
            start_year,
            sma_window,
        })
    }

    /// Nominal start year of the backtest.
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// SMA window length in months.
    pub fn sma_window(&self) -> usize {
        self.sma_window
    }

    /// SHA256 hash of the serialized parameters, for cache keys and result
    /// provenance.
    pub fn hash(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(bytes) => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                format!("{:x}", hasher.finalize())
            }
            Err(e) => {
                warn!("Failed to serialize params for hashing: {}", e);
                String::new()
            }
        }
    }
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            start_year: 2010,
            sma_window: 10,
        }
    }
}

/// One month of the backtest output table.
///
/// `f64::NAN` encodes undefined values in the float columns; `sma` is absent
/// while the trailing window is still filling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRow {
    pub timestamp: DateTime<Utc>,
    /// Closing price of the month.
    pub close: f64,
    /// Trailing simple moving average of `close`, inclusive of this month.
    pub sma: Option<f64>,
    /// Exposure during this month: 1.0 invested, 0.0 in cash. Decided from
    /// the previous month's close/SMA comparison, never this month's.
    pub position: f64,
    /// Signal crossing observed this month, effective next month.
    pub trade: TradeEvent,
    /// Month-over-month return of the asset.
    pub asset_return: f64,
    /// Asset return while invested, zero while in cash.
    pub strategy_return: f64,
    /// Compounded return since the nominal start date.
    pub cum_asset: f64,
    pub cum_strategy: f64,
    /// Decline of the growth-of-1 index from its running peak (<= 0).
    pub asset_drawdown: f64,
    pub strategy_drawdown: f64,
}

/// Dense monthly output table of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTable {
    /// Rows in timestamp order, starting one month ahead of the nominal start.
    pub rows: Vec<BacktestRow>,
    /// Nominal start of the backtest; cumulative returns are zero before it.
    pub start_dt: DateTime<Utc>,
    /// Parameters the table was computed with.
    pub params: BacktestParams,
    /// SHA256 checksum of the input series, for provenance.
    pub data_checksum: String,
    /// SHA256 hash of the parameters.
    pub params_hash: String,
}

impl BacktestTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the output window is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a row by its timestamp.
    pub fn row_at(&self, timestamp: DateTime<Utc>) -> Option<&BacktestRow> {
        self.rows
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Timestamps in order.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.rows.iter().map(|r| r.timestamp)
    }

    /// Monthly asset (buy-and-hold) returns.
    pub fn asset_returns(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.asset_return)
    }

    /// Monthly strategy returns.
    pub fn strategy_returns(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.strategy_return)
    }

    /// Buy-and-hold drawdown series.
    pub fn asset_drawdowns(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.asset_drawdown)
    }

    /// Strategy drawdown series.
    pub fn strategy_drawdowns(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.strategy_drawdown)
    }

    /// Serialize the table to pretty-printed JSON for downstream consumers.
    /// NaN cells serialize as null.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compounds a return stream into a growth-of-1 index and tracks its
/// drawdown from the running peak. NaN input poisons the index from that row
/// on, matching multiplicative compounding semantics.
struct CumulativeTrack {
    growth: f64,
    peak: f64,
}

impl CumulativeTrack {
    fn new() -> Self {
        Self {
            growth: 1.0,
            peak: f64::NEG_INFINITY,
        }
    }

    /// Apply one period's return; returns (cumulative return, drawdown).
    fn step(&mut self, ret: f64) -> (f64, f64) {
        self.growth *= 1.0 + ret;
        if self.growth.is_nan() {
            // Peak is left untouched so a hypothetical recovery would still
            // measure against the pre-NaN high.
            (f64::NAN, f64::NAN)
        } else {
            self.peak = self.peak.max(self.growth);
            (self.growth - 1.0, self.growth / self.peak - 1.0)
        }
    }
}

/// The backtest engine. Stateless between runs; each call derives a fresh
/// table from its inputs.
pub struct Backtester {
    params: BacktestParams,
}

impl Backtester {
    /// Create a new backtester.
    pub fn new(params: BacktestParams) -> Self {
        Self { params }
    }

    /// Create with default parameters (start 2010, 10-month SMA).
    pub fn with_defaults() -> Self {
        Self::new(BacktestParams::default())
    }

    /// The configured parameters.
    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    /// Run the backtest over a monthly price series.
    ///
    /// Signals are computed over the entire input so the SMA has its full
    /// lookback before the requested start; the output table is then
    /// truncated to one month ahead of the nominal start date.
    pub fn run(&self, series: &PriceSeries) -> Result<BacktestTable> {
        let window = self.params.sma_window();
        if window < 2 {
            // Deserialized params can bypass the validating constructor.
            return Err(FaberError::InvalidWindow { window });
        }

        let closes = series.closes();
        let stamps = series.timestamps();
        let n = closes.len();

        info!(
            "Running backtest: {}-month SMA from {} over {} observations",
            window,
            self.params.start_year(),
            n
        );

        // Trailing SMA over the full series, absent while the window fills.
        let mut sma: Vec<Option<f64>> = vec![None; n];
        for (i, win) in closes.windows(window).enumerate() {
            sma[i + window - 1] = Some(win.iter().sum::<f64>() / window as f64);
        }

        // Signal at t, held as position at t+1. An undefined signal means flat.
        let signal: Vec<f64> = (0..n)
            .map(|t| match sma[t] {
                Some(mean) if closes[t] > mean => 1.0,
                _ => 0.0,
            })
            .collect();
        let position: Vec<f64> = (0..n)
            .map(|t| if t == 0 { 0.0 } else { signal[t - 1] })
            .collect();

        // Trade events, recorded at the month the crossing is observed.
        let trade: Vec<TradeEvent> = (0..n)
            .map(|t| {
                if t + 1 < n {
                    TradeEvent::from_delta((position[t + 1] - position[t]) as i8)
                } else {
                    TradeEvent::Hold
                }
            })
            .collect();

        // Period returns. A zero close makes the next return NaN rather than
        // infinite, and the NaN then rides the compounding downstream.
        let asset_return: Vec<f64> = (0..n)
            .map(|t| {
                if t == 0 || closes[t - 1] == 0.0 {
                    f64::NAN
                } else {
                    closes[t] / closes[t - 1] - 1.0
                }
            })
            .collect();
        let strategy_return: Vec<f64> = (0..n)
            .map(|t| asset_return[t] * position[t])
            .collect();

        // Truncate to one month of context ahead of the nominal start.
        let cutoff = calendar::backtest_cutoff(self.params.start_year());
        let start_dt = calendar::year_start(self.params.start_year());
        let first = stamps.partition_point(|&ts| ts < cutoff);
        if first == n {
            warn!(
                "No observations on or after {}; returning an empty table",
                cutoff
            );
        } else {
            debug!(
                "Output window: {} rows from {}",
                n - first,
                stamps[first]
            );
        }

        // Compound cumulative returns and drawdowns over the output window.
        let mut rows = Vec::with_capacity(n - first);
        let mut asset_track = CumulativeTrack::new();
        let mut strategy_track = CumulativeTrack::new();

        for t in first..n {
            // Returns before the nominal start contribute zero; NaN stays NaN.
            let mask = if stamps[t] < start_dt { 0.0 } else { 1.0 };
            let (cum_asset, asset_drawdown) = asset_track.step(asset_return[t] * mask);
            let (cum_strategy, strategy_drawdown) =
                strategy_track.step(strategy_return[t] * mask);

            rows.push(BacktestRow {
                timestamp: stamps[t],
                close: closes[t],
                sma: sma[t],
                position: position[t],
                trade: trade[t],
                asset_return: asset_return[t],
                strategy_return: strategy_return[t],
                cum_asset,
                cum_strategy,
                asset_drawdown,
                strategy_drawdown,
            });
        }

        Ok(BacktestTable {
            rows,
            start_dt,
            params: self.params,
            data_checksum: series.checksum(),
            params_hash: self.params.hash(),
        })
    }
}

/// Explicit memo for backtest results, keyed by input content.
///
/// Purely an optimization for callers re-running the same inputs; the engine
/// itself stays deterministic and stateless.
#[derive(Default)]
pub struct BacktestCache {
    entries: HashMap<(String, String), Arc<BacktestTable>>,
}

impl BacktestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the backtest, reusing a cached table when the series content and
    /// parameters both match a previous run.
    pub fn run(
        &mut self,
        backtester: &Backtester,
        series: &PriceSeries,
    ) -> Result<Arc<BacktestTable>> {
        let key = (series.checksum(), backtester.params().hash());
        if let Some(table) = self.entries.get(&key) {
            debug!("Backtest cache hit");
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(backtester.run(series)?);
        self.entries.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached tables.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
