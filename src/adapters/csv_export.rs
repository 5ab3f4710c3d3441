//! CSV export of series, analytics, forecasts and the monthly table.
//!
//! The index column comes first and is named `date`. Daily timestamps are
//! written as `%Y-%m-%d`, intraday ones as `%Y-%m-%d %H:%M:%S`. Missing and
//! non-finite values are written as empty cells.

use crate::domain::analytics::AnalyticsReport;
use crate::domain::error::AnalyticsError;
use crate::domain::forecast::ForecastRecord;
use crate::domain::monthly::{MonthlyPlRow, MONTH_NAMES};
use crate::domain::ohlcv::OhlcvSeries;
use chrono::{NaiveDateTime, NaiveTime};
use std::io::Write;

const OHLCV_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::Writer::from_writer(out)
}

fn csv_err(e: csv::Error) -> AnalyticsError {
    AnalyticsError::Io(e.into())
}

fn timestamp(t: NaiveDateTime, daily: bool) -> String {
    if daily {
        t.format("%Y-%m-%d").to_string()
    } else {
        t.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn num(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}

fn opt(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

pub fn write_series<W: Write>(out: W, series: &OhlcvSeries) -> Result<(), AnalyticsError> {
    let daily = series.is_daily();
    let mut wtr = writer(out);
    wtr.write_record(OHLCV_COLUMNS).map_err(csv_err)?;
    for b in series.bars() {
        wtr.write_record([
            timestamp(b.timestamp, daily),
            num(b.open),
            num(b.high),
            num(b.low),
            num(b.close),
            b.volume.to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per bar: OHLCV, P/L columns, indicators and signals.
pub fn write_analytics<W: Write>(out: W, report: &AnalyticsReport) -> Result<(), AnalyticsError> {
    let daily = report.pl.iter().all(|r| r.timestamp.time() == NaiveTime::MIN);
    let mut wtr = writer(out);
    let mut header: Vec<&str> = OHLCV_COLUMNS.to_vec();
    header.extend([
        "pl_value",
        "pl_pct",
        "z_pl",
        "z_volume",
        "anomaly",
        "sma20",
        "rsi14",
        "macd",
        "macd_signal",
        "mean_reversion",
        "momentum",
    ]);
    wtr.write_record(&header).map_err(csv_err)?;

    let rows = report.pl.iter().zip(&report.indicators).zip(&report.signals);
    for ((p, i), s) in rows {
        wtr.write_record([
            timestamp(p.timestamp, daily),
            num(p.open),
            num(p.high),
            num(p.low),
            num(p.close),
            p.volume.to_string(),
            num(p.pl_value),
            num(p.pl_pct),
            num(p.z_pl),
            num(p.z_volume),
            p.anomaly.to_string(),
            opt(i.sma20),
            opt(i.rsi14),
            num(i.macd),
            num(i.macd_signal),
            s.mean_reversion.to_string(),
            s.momentum.to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_forecast<W: Write>(out: W, records: &[ForecastRecord]) -> Result<(), AnalyticsError> {
    let mut wtr = writer(out);
    wtr.write_record(["date", "predicted_close", "lower_bound", "upper_bound"])
        .map_err(csv_err)?;
    for r in records {
        wtr.write_record([
            r.date.format("%Y-%m-%d").to_string(),
            num(r.predicted_close),
            num(r.lower_bound),
            num(r.upper_bound),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_monthly<W: Write>(out: W, rows: &[MonthlyPlRow]) -> Result<(), AnalyticsError> {
    let mut wtr = writer(out);
    let mut header = vec!["year"];
    header.extend(MONTH_NAMES);
    wtr.write_record(&header).map_err(csv_err)?;
    for row in rows {
        let mut record = vec![row.year.to_string()];
        record.extend(row.months.iter().map(|m| format!("{:.2}", m)));
        wtr.write_record(&record).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}
