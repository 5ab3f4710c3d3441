//! Technical indicators over the close series.
//!
//! The calculators work on plain `&[f64]` closes and return one value per
//! input row. [`compute_indicators`] combines them into [`IndicatorRow`]s:
//! - `sma20`: 20-sample trailing mean, null until the window is full
//! - `rsi14`: 14-sample RSI from rolling-mean gains and losses
//! - `macd`/`macd_signal`: EMA(12) − EMA(26) and its EMA(9), no warm-up gap

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdLine};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use crate::domain::ohlcv::OhlcvSeries;
use chrono::NaiveDateTime;

pub const SMA_PERIOD: usize = 20;
pub const RSI_PERIOD: usize = 14;

/// Indicator values for one row, aligned with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub sma20: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: f64,
    pub macd_signal: f64,
}

pub fn compute_indicators(series: &OhlcvSeries) -> Vec<IndicatorRow> {
    let closes = series.closes();
    let sma = calculate_sma(&closes, SMA_PERIOD);
    let rsi = calculate_rsi(&closes, RSI_PERIOD);
    let macd = macd::calculate_macd_default(&closes);

    series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            timestamp: bar.timestamp,
            close: bar.close,
            sma20: sma[i],
            rsi14: rsi[i],
            macd: macd[i].line,
            macd_signal: macd[i].signal,
        })
        .collect()
}

/// `Some(v)` for finite `v`, else `None`.
pub(crate) fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{Duration, NaiveDate};

    fn series(closes: &[f64]) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar::daily(start + Duration::days(i as i64), c, c, c, c, 1_000))
            .collect();
        OhlcvSeries::from_bars(bars).unwrap()
    }

    #[test]
    fn rows_align_with_series() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let s = series(&closes);
        let rows = compute_indicators(&s);
        assert_eq!(rows.len(), 30);
        for (row, bar) in rows.iter().zip(s.bars()) {
            assert_eq!(row.timestamp, bar.timestamp);
            assert_eq!(row.close, bar.close);
        }
    }

    #[test]
    fn warm_up_nulls() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 4) as f64).collect();
        let rows = compute_indicators(&series(&closes));
        assert!(rows[..19].iter().all(|r| r.sma20.is_none()));
        assert!(rows[19..].iter().all(|r| r.sma20.is_some()));
        assert!(rows[..14].iter().all(|r| r.rsi14.is_none()));
        assert!(rows[14..].iter().all(|r| r.rsi14.is_some()));
        assert!(rows.iter().all(|r| r.macd.is_finite() && r.macd_signal.is_finite()));
    }

    #[test]
    fn short_series_has_only_macd() {
        let rows = compute_indicators(&series(&[10.0, 11.0, 12.0]));
        assert!(rows.iter().all(|r| r.sma20.is_none() && r.rsi14.is_none()));
        assert_eq!(rows[0].macd, 0.0);
    }

    #[test]
    fn finite_filters_nan_and_inf() {
        assert_eq!(finite(1.5), Some(1.5));
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::INFINITY), None);
    }
}
