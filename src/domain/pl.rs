//! Profit/loss per bar with sample z-scores and anomaly flags.

use crate::domain::ohlcv::OhlcvSeries;
use chrono::NaiveDateTime;

/// |z| above this marks a row as anomalous.
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlRecord {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub pl_value: f64,
    pub pl_pct: f64,
    pub z_pl: f64,
    pub z_volume: f64,
    pub anomaly: bool,
}

/// One record per bar, in series order.
///
/// `z_pl` is taken over the rounded `pl_pct` column. A single-row series
/// yields NaN z-scores and no anomaly.
pub fn compute_pl(series: &OhlcvSeries) -> Vec<PlRecord> {
    let bars = series.bars();
    let pl_values: Vec<f64> = bars.iter().map(|b| b.close - b.open).collect();
    let pl_pcts: Vec<f64> = bars
        .iter()
        .zip(&pl_values)
        .map(|(b, pl)| round2(pl / b.open * 100.0))
        .collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    let z_pl = z_scores(&pl_pcts);
    let z_volume = z_scores(&volumes);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| PlRecord {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            pl_value: pl_values[i],
            pl_pct: pl_pcts[i],
            z_pl: z_pl[i],
            z_volume: z_volume[i],
            anomaly: is_anomaly(z_pl[i], z_volume[i]),
        })
        .collect()
}

pub fn is_anomaly(z_pl: f64, z_volume: f64) -> bool {
    z_pl.abs() > ANOMALY_Z_THRESHOLD || z_volume.abs() > ANOMALY_Z_THRESHOLD
}

/// Round to two decimals, ties to even.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

/// Mean of the non-NaN values; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sample standard deviation (n-1) of the non-NaN values; NaN below two values.
pub fn nan_sample_std(values: &[f64]) -> f64 {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.len() < 2 {
        return f64::NAN;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (present.len() - 1) as f64).sqrt()
}

fn z_scores(values: &[f64]) -> Vec<f64> {
    let mean = nan_mean(values);
    let std = nan_sample_std(values);
    values.iter().map(|v| (v - mean) / std).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn series(rows: &[(f64, f64, u64)]) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(open, close, volume))| {
                OhlcvBar::daily(
                    start + Duration::days(i as i64),
                    open,
                    open.max(close),
                    open.min(close),
                    close,
                    volume,
                )
            })
            .collect();
        OhlcvSeries::from_bars(bars).unwrap()
    }

    #[test]
    fn pl_value_and_pct() {
        let records = compute_pl(&series(&[(100.0, 103.0, 10), (200.0, 199.0, 20)]));
        assert_eq!(records[0].pl_value, 3.0);
        assert_eq!(records[0].pl_pct, 3.0);
        assert_eq!(records[1].pl_value, -1.0);
        assert_eq!(records[1].pl_pct, -0.5);
    }

    #[test]
    fn pct_rounds_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn single_row_has_nan_z_scores() {
        let records = compute_pl(&series(&[(10.0, 11.0, 100)]));
        assert!(records[0].z_pl.is_nan());
        assert!(records[0].z_volume.is_nan());
        assert!(!records[0].anomaly);
    }

    #[test]
    fn z_scores_use_sample_std() {
        let records = compute_pl(&series(&[(10.0, 11.0, 1), (10.0, 12.0, 2), (10.0, 13.0, 3)]));
        // pl_pct = 10, 20, 30 -> mean 20, sample std 10
        assert_relative_eq!(records[0].z_pl, -1.0);
        assert_relative_eq!(records[1].z_pl, 0.0);
        assert_relative_eq!(records[2].z_pl, 1.0);
        assert_relative_eq!(records[2].z_volume, 1.0);
    }

    #[test]
    fn spike_is_flagged() {
        let mut rows = vec![(100.0, 100.5, 1_000); 20];
        rows.push((100.0, 100.5, 50_000));
        let records = compute_pl(&series(&rows));
        assert!(records[20].anomaly);
        assert!(records[20].z_volume > ANOMALY_Z_THRESHOLD);
        assert!(records[..20].iter().all(|r| !r.anomaly));
    }

    #[test]
    fn anomaly_matches_formula() {
        let rows: Vec<(f64, f64, u64)> = (0..30)
            .map(|i| (100.0, 100.0 + ((i * 7) % 11) as f64 - 5.0, 1_000 + (i * 37 % 13) as u64))
            .collect();
        for r in compute_pl(&series(&rows)) {
            assert_eq!(r.anomaly, r.z_pl.abs() > 2.0 || r.z_volume.abs() > 2.0);
        }
    }

    #[test]
    fn nan_values_skipped_in_stats() {
        assert_relative_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_relative_eq!(nan_sample_std(&[1.0, f64::NAN, 3.0]), 2f64.sqrt());
        assert!(nan_mean(&[f64::NAN]).is_nan());
    }
}
