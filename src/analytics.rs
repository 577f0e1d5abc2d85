//! Performance statistics and reporting.
//!
//! The summarizer reduces a [`BacktestTable`](crate::engine::BacktestTable)
//! to one comparison row per return stream: buy-and-hold versus the
//! strategy. Statistics are computed over defined (non-NaN) values only;
//! degenerate inputs surface as NaN rather than errors, and the caller
//! decides how to display them.

use crate::engine::BacktestTable;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};

/// Months per year, the annualization base for monthly observations.
const PERIODS_PER_YEAR: f64 = 12.0;

/// Summary statistics for one return stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    /// "Buy & Hold" or "Strategy".
    pub label: String,
    /// Geometric annualized return.
    pub ann_return: f64,
    /// Annualized volatility (sample standard deviation, sqrt-time scaled).
    pub ann_vol: f64,
    /// Worst peak-to-trough decline (most negative drawdown).
    pub max_drawdown: f64,
    /// Annualized return per unit of annualized volatility.
    pub return_over_vol: f64,
}

/// Compare buy-and-hold against the strategy.
///
/// Returns two rows in fixed order: "Buy & Hold", then "Strategy".
pub fn summarize(table: &BacktestTable) -> Vec<SummaryRow> {
    vec![
        summary_row("Buy & Hold", table.asset_returns(), table.asset_drawdowns()),
        summary_row(
            "Strategy",
            table.strategy_returns(),
            table.strategy_drawdowns(),
        ),
    ]
}

fn summary_row(
    label: &str,
    returns: impl Iterator<Item = f64>,
    drawdowns: impl Iterator<Item = f64>,
) -> SummaryRow {
    let defined: Vec<f64> = returns.filter(|r| !r.is_nan()).collect();
    let ann_return = annualized_return(&defined);
    let ann_vol = annualized_volatility(&defined);

    SummaryRow {
        label: label.to_string(),
        ann_return,
        ann_vol,
        max_drawdown: max_drawdown(drawdowns),
        return_over_vol: ann_return / ann_vol,
    }
}

/// Geometric annualized return of a monthly return series.
///
/// NaN when there are no observations.
pub fn annualized_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    growth.powf(PERIODS_PER_YEAR / returns.len() as f64) - 1.0
}

/// Annualized volatility of a monthly return series (sample standard
/// deviation scaled by sqrt(12)).
///
/// NaN when there are fewer than two observations.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt() * PERIODS_PER_YEAR.sqrt()
}

/// Most negative value of a drawdown series, skipping NaN.
///
/// NaN when no value is defined.
pub fn max_drawdown(drawdowns: impl Iterator<Item = f64>) -> f64 {
    // f64::min ignores the NaN seed once the first defined value arrives.
    drawdowns.filter(|d| !d.is_nan()).fold(f64::NAN, f64::min)
}

/// Format results for terminal display.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print the comparison panel as a rounded table.
    pub fn print_summary(rows: &[SummaryRow], title: &str) {
        println!();
        println!("{}", format!(" {} ", title).bold().blue());

        let mut builder = Builder::new();
        builder.push_record(["", "Return (annual)", "Volatility", "Max DrawDown", "Ret / Vol"]);

        for row in rows {
            builder.push_record([
                row.label.clone(),
                Self::format_pct(row.ann_return),
                Self::format_pct(row.ann_vol),
                Self::format_pct(row.max_drawdown),
                Self::format_ratio(row.return_over_vol),
            ]);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        println!("{}", table);

        if let [hold, strategy] = rows {
            let edge = strategy.ann_return - hold.ann_return;
            if !edge.is_nan() {
                println!(
                    "  Annual edge vs Buy & Hold: {}",
                    Self::format_pct_change(edge)
                );
            }
        }
    }

    /// Format a fraction as a percentage; blank when undefined.
    fn format_pct(value: f64) -> String {
        if value.is_nan() {
            String::new()
        } else {
            format!("{:.1}%", value * 100.0)
        }
    }

    /// Format a percentage-point change with color.
    fn format_pct_change(change: f64) -> String {
        if change >= 0.0 {
            format!("+{:.1}%", change * 100.0).green().to_string()
        } else {
            format!("{:.1}%", change * 100.0).red().to_string()
        }
    }

    /// Format a ratio with two decimals; blank when undefined.
    fn format_ratio(value: f64) -> String {
        if value.is_nan() {
            String::new()
        } else {
            format!("{:.2}", value)
        }
    }

    /// Export summary rows to JSON.
    pub fn to_json(rows: &[SummaryRow]) -> String {
        serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
    }

    /// Export one summary row as a CSV line.
    pub fn summary_csv_line(row: &SummaryRow) -> String {
        format!(
            "{},{:.6},{:.6},{:.6},{:.4}",
            row.label, row.ann_return, row.ann_vol, row.max_drawdown, row.return_over_vol
        )
    }

    /// CSV header matching [`summary_csv_line`](Self::summary_csv_line).
    pub fn csv_header() -> &'static str {
        "label,ann_return,ann_vol,max_drawdown,return_over_vol"
    }
}
