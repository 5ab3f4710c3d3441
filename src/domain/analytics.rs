//! Deterministic analytics over one series.

use crate::domain::indicator::{compute_indicators, IndicatorRow};
use crate::domain::ohlcv::OhlcvSeries;
use crate::domain::pl::{compute_pl, PlRecord};
use crate::domain::signal::{compute_signals, SignalRow};

/// P/L, indicator and signal tables, each aligned 1:1 with the series.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub pl: Vec<PlRecord>,
    pub indicators: Vec<IndicatorRow>,
    pub signals: Vec<SignalRow>,
}

impl AnalyticsReport {
    pub fn len(&self) -> usize {
        self.pl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pl.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.pl.iter().filter(|r| r.anomaly).count()
    }
}

pub fn analyze(series: &OhlcvSeries) -> AnalyticsReport {
    let pl = compute_pl(series);
    let indicators = compute_indicators(series);
    let signals = compute_signals(&indicators);
    AnalyticsReport {
        pl,
        indicators,
        signals,
    }
}
