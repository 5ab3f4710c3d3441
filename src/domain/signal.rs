//! Rule-based trading signals from indicator rows.

use crate::domain::indicator::IndicatorRow;
use chrono::NaiveDateTime;
use std::fmt;

/// Band around SMA20 inside which mean reversion holds.
pub const SMA_BUY_RATIO: f64 = 0.95;
pub const SMA_SELL_RATIO: f64 = 1.05;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "Buy"),
            Signal::Sell => write!(f, "Sell"),
            Signal::Hold => write!(f, "Hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub timestamp: NaiveDateTime,
    pub mean_reversion: Signal,
    pub momentum: Signal,
}

pub fn mean_reversion(close: f64, sma20: Option<f64>) -> Signal {
    match sma20 {
        Some(sma) if close < sma * SMA_BUY_RATIO => Signal::Buy,
        Some(sma) if close > sma * SMA_SELL_RATIO => Signal::Sell,
        _ => Signal::Hold,
    }
}

pub fn momentum(rsi14: Option<f64>) -> Signal {
    match rsi14 {
        Some(rsi) if rsi < RSI_OVERSOLD => Signal::Buy,
        Some(rsi) if rsi > RSI_OVERBOUGHT => Signal::Sell,
        _ => Signal::Hold,
    }
}

pub fn compute_signals(rows: &[IndicatorRow]) -> Vec<SignalRow> {
    rows.iter()
        .map(|row| SignalRow {
            timestamp: row.timestamp,
            mean_reversion: mean_reversion(row.close, row.sma20),
            momentum: momentum(row.rsi14),
        })
        .collect()
}
