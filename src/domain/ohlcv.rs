//! Canonical OHLCV bar and series.

use crate::domain::error::AnalyticsError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl OhlcvBar {
    /// Daily bar stamped at midnight of `date`.
    pub fn daily(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            timestamp: date.and_time(NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// True when the bar carries no time-of-day component.
    pub fn is_daily(&self) -> bool {
        self.timestamp.time() == NaiveTime::MIN
    }
}

/// An ordered, duplicate-free sequence of bars.
///
/// The only constructor checks the index invariant, so downstream engines can
/// rely on strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvSeries {
    bars: Vec<OhlcvBar>,
}

impl OhlcvSeries {
    pub fn from_bars(bars: Vec<OhlcvBar>) -> Result<Self, AnalyticsError> {
        if bars.is_empty() {
            return Err(AnalyticsError::EmptyDataset);
        }
        if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp >= w[1].timestamp) {
            return Err(AnalyticsError::InvalidIndex {
                reason: format!(
                    "timestamps not strictly increasing at {} -> {}",
                    pair[0].timestamp, pair[1].timestamp
                ),
            });
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &OhlcvBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &OhlcvBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// True when every bar is a daily (midnight-stamped) bar.
    pub fn is_daily(&self) -> bool {
        self.bars.iter().all(OhlcvBar::is_daily)
    }
}
