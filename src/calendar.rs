//! Business-month-start arithmetic for anchoring the backtest window.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};

/// First business day (Mon-Fri, weekend-only calendar) of the given month,
/// at midnight UTC.
pub fn business_month_start(year: i32, month: u32) -> DateTime<Utc> {
    let mut date = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date.succ_opt().unwrap();
    }
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

/// Nominal start of the backtest: January 1st of the start year.
///
/// Returns compound from this instant; earlier rows contribute zero.
pub fn year_start(year: i32) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    )
}

/// Truncation cutoff for the output table: the business month start of the
/// December preceding the start year. This keeps one month of context ahead
/// of the nominal start so the first cumulative-return value has a defined
/// anchor.
pub fn backtest_cutoff(start_year: i32) -> DateTime<Utc> {
    business_month_start(start_year - 1, 12)
}
