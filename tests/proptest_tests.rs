//! Property-based tests using proptest for invariant testing.
//!
//! These tests verify that under arbitrary positive monthly price paths:
//! 1. Positions are always binary and never depend on future prices
//! 2. Trade events always equal the one-month-ahead position delta
//! 3. Drawdowns are bounded above by zero and vanish at running highs
//! 4. Cumulative returns are zero before the nominal start date
//! 5. The engine is deterministic and the summarizer never panics

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use faber::analytics::summarize;
use faber::engine::{Backtester, BacktestParams, BacktestTable};
use faber::types::{PricePoint, PriceSeries, TradeEvent};

const FIRST_YEAR: i32 = 2017;
const START_YEAR: i32 = 2021;

fn monthly_series(closes: &[f64]) -> PriceSeries {
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let year = FIRST_YEAR + i as i32 / 12;
            let month = 1 + i as u32 % 12;
            PricePoint::new(
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap(),
                close,
            )
        })
        .collect();
    PriceSeries::new(points).unwrap()
}

fn run(closes: &[f64], window: usize) -> BacktestTable {
    Backtester::new(BacktestParams::new(START_YEAR, window).unwrap())
        .run(&monthly_series(closes))
        .unwrap()
}

/// Strategy generating positive monthly close paths long enough to reach the
/// backtest window, plus an SMA window length.
fn closes_and_window() -> impl Strategy<Value = (Vec<f64>, usize)> {
    (
        prop::collection::vec(1.0..1000.0f64, 50..90),
        2..12usize,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn position_is_always_binary((closes, window) in closes_and_window()) {
        let table = run(&closes, window);
        for row in &table.rows {
            prop_assert!(row.position == 0.0 || row.position == 1.0);
        }
    }

    #[test]
    fn trade_equals_position_delta((closes, window) in closes_and_window()) {
        let table = run(&closes, window);
        for pair in table.rows.windows(2) {
            prop_assert_eq!(
                f64::from(pair[0].trade.delta()),
                pair[1].position - pair[0].position
            );
        }
        if let Some(last) = table.rows.last() {
            prop_assert_eq!(last.trade, TradeEvent::Hold);
        }
    }

    #[test]
    fn drawdown_is_bounded_and_zero_at_highs((closes, window) in closes_and_window()) {
        let table = run(&closes, window);

        let mut peak = f64::NEG_INFINITY;
        for row in &table.rows {
            prop_assert!(row.asset_drawdown <= 1e-12 || row.asset_drawdown.is_nan());
            prop_assert!(row.strategy_drawdown <= 1e-12 || row.strategy_drawdown.is_nan());

            let index = 1.0 + row.cum_asset;
            if !index.is_nan() && index >= peak {
                peak = index;
                prop_assert!(row.asset_drawdown.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn cumulative_returns_are_zero_before_start((closes, window) in closes_and_window()) {
        let table = run(&closes, window);
        for row in table.rows.iter().filter(|r| r.timestamp < table.start_dt) {
            prop_assert_eq!(row.cum_asset, 0.0);
            prop_assert_eq!(row.cum_strategy, 0.0);
        }
    }

    #[test]
    fn future_prices_never_change_past_positions(
        (closes, window) in closes_and_window(),
        shock in 1.5..10.0f64,
    ) {
        // Shock the final observation: no position anywhere in the table may
        // move, because every position is decided on strictly earlier data.
        let mut shocked = closes.clone();
        let last = shocked.len() - 1;
        shocked[last] *= shock;

        let table_a = run(&closes, window);
        let table_b = run(&shocked, window);

        prop_assert_eq!(table_a.len(), table_b.len());
        for (a, b) in table_a.rows.iter().zip(table_b.rows.iter()) {
            prop_assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn engine_is_deterministic((closes, window) in closes_and_window()) {
        let table_a = run(&closes, window);
        let table_b = run(&closes, window);
        prop_assert_eq!(format!("{:?}", table_a.rows), format!("{:?}", table_b.rows));
    }

    #[test]
    fn summarizer_never_panics((closes, window) in closes_and_window()) {
        let table = run(&closes, window);
        let stats = summarize(&table);

        prop_assert_eq!(stats.len(), 2);
        for row in &stats {
            // Volatility is non-negative whenever it is defined.
            prop_assert!(row.ann_vol.is_nan() || row.ann_vol >= 0.0);
            // Drawdown is never positive whenever it is defined.
            prop_assert!(row.max_drawdown.is_nan() || row.max_drawdown <= 1e-12);
        }
    }
}
