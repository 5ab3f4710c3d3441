#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stockpulse::domain::error::DateRange;
use stockpulse::domain::fetcher::SourceFetcher;
use stockpulse::domain::normalize::{ColumnHeader, IndexValue, RawTable};
pub use stockpulse::domain::ohlcv::{OhlcvBar, OhlcvSeries};
use stockpulse::domain::period::FetchWindow;
use stockpulse::domain::retry::RetryPolicy;
use stockpulse::ports::market_data_port::{MarketDataPort, ProviderError, Sleeper};

pub type Reply = Result<RawTable, ProviderError>;

/// Market data port that answers from a script, in order.
///
/// Once the script runs out every call returns `fallback` (an empty table
/// unless set).
pub struct MockMarketData {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    range: Option<DateRange>,
    latency: std::time::Duration,
    calls: Mutex<Vec<FetchWindow>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(RawTable::default()),
            range: None,
            latency: std::time::Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_table(self, table: RawTable) -> Self {
        self.with_reply(Ok(table))
    }

    pub fn with_error(self, err: ProviderError) -> Self {
        self.with_reply(Err(err))
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_range(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.range = Some(DateRange { first, last });
        self
    }

    /// Real delay inside every fetch, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<FetchWindow> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch(&self, _symbol: &str, window: &FetchWindow) -> Result<RawTable, ProviderError> {
        self.calls.lock().unwrap().push(*window);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn available_range(&self, _symbol: &str) -> Result<Option<DateRange>, ProviderError> {
        Ok(self.range)
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<std::time::Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<std::time::Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: std::time::Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn fetcher_with(
    port: Arc<MockMarketData>,
    sleeper: Arc<RecordingSleeper>,
    max_retries: u32,
) -> SourceFetcher {
    let policy = RetryPolicy::new(max_retries, std::time::Duration::from_millis(100)).unwrap();
    SourceFetcher::new(port, sleeper, policy, std::time::Duration::from_secs(60))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fixed clock used by the fetch tests: 2024-06-14 16:00.
pub fn now() -> NaiveDateTime {
    date(2024, 6, 14).and_hms_opt(16, 0, 0).unwrap()
}

pub fn make_bar(date: &str, close: f64) -> OhlcvBar {
    OhlcvBar::daily(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        close - 1.0,
        close + 1.0,
        close - 2.0,
        close,
        1000,
    )
}

/// One bar per weekday over `count` calendar days starting at `start`.
pub fn generate_bars(start: NaiveDate, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| start + Duration::days(i as i64))
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .enumerate()
        .map(|(i, d)| {
            let close = start_price + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
            OhlcvBar::daily(d, close - 0.5, close + 1.0, close - 1.0, close, 1_000_000 + (i as u64 % 7) * 10_000)
        })
        .collect()
}

/// Provider-style table (capitalized columns, date index) for `bars`.
pub fn table_from_bars(bars: &[OhlcvBar]) -> RawTable {
    let headers = ["Open", "High", "Low", "Close", "Volume"]
        .into_iter()
        .map(ColumnHeader::new)
        .collect();
    let index = bars.iter().map(|b| IndexValue::Date(b.date())).collect();
    let rows = bars
        .iter()
        .map(|b| {
            vec![
                Some(b.open),
                Some(b.high),
                Some(b.low),
                Some(b.close),
                Some(b.volume as f64),
            ]
        })
        .collect();
    RawTable::new(headers, index, rows)
}

pub fn series(bars: Vec<OhlcvBar>) -> OhlcvSeries {
    OhlcvSeries::from_bars(bars).unwrap()
}
