//! Faber - a monthly trend-following backtest engine.
//!
//! # Overview
//!
//! Faber evaluates the trend-following rule from Faber's 2007 paper
//! ("A Quantitative Approach to Tactical Asset Allocation") against a
//! buy-and-hold baseline:
//!
//! - **Buy** when the monthly close is above its N-month simple moving
//!   average.
//! - **Sell and move to cash** when the monthly close falls below it.
//!
//! The signal is always evaluated on the *previous* month's data, so the
//! engine never acts on information that was not available at decision time.
//! A run produces a dense monthly table (close, SMA, position, trade events,
//! returns, cumulative returns, drawdowns) plus a small comparison panel of
//! annualized risk/return statistics.
//!
//! # Quick Start
//!
//! ```
//! use faber::analytics::summarize;
//! use faber::data::load_sample;
//! use faber::engine::{Backtester, BacktestParams};
//!
//! let series = load_sample("DEMO").unwrap();
//!
//! let params = BacktestParams::new(2010, 10).unwrap();
//! let table = Backtester::new(params).run(&series).unwrap();
//!
//! for row in summarize(&table) {
//!     println!(
//!         "{:<12} annual return {:>6.1}%  max drawdown {:>6.1}%",
//!         row.label,
//!         row.ann_return * 100.0,
//!         row.max_drawdown * 100.0
//!     );
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Price series and trade event types
//! - [`data`]: CSV loading, monthly resampling, bundled samples
//! - [`calendar`]: Business-month-start arithmetic
//! - [`engine`]: Signal generation and backtest execution
//! - [`analytics`]: Summary statistics and reporting
//! - [`config`]: TOML configuration file support
//! - [`error`]: Error types

pub mod analytics;
pub mod calendar;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use analytics::{summarize, ResultFormatter, SummaryRow};
pub use config::BacktestFileConfig;
pub use data::{load_csv, load_sample, resample_monthly, DataConfig};
pub use engine::{BacktestCache, BacktestParams, BacktestRow, BacktestTable, Backtester};
pub use error::{FaberError, Result};
pub use types::{PricePoint, PriceSeries, TradeEvent};
