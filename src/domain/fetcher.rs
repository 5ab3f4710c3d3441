//! Source fetcher: bounded retries, backoff and the fallback ladder over a
//! [`MarketDataPort`], with a TTL cache in front.

use crate::domain::cache::FetchCache;
use crate::domain::error::AnalyticsError;
use crate::domain::normalize::{self, RawTable};
use crate::domain::ohlcv::OhlcvSeries;
use crate::domain::period::{self, CustomRange, FetchWindow, Interval, PeriodToken};
use crate::domain::retry::{AttemptState, CancelToken, FallbackLadder, RetryPolicy};
use crate::domain::symbol::validate_symbol;
use crate::ports::market_data_port::{MarketDataPort, ProviderError, Sleeper};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Periods offered back to the user when a request finds no data.
const SUGGESTED_PERIODS: [PeriodToken; 4] = [
    PeriodToken::RealTime,
    PeriodToken::OneMonth,
    PeriodToken::YearToDate,
    PeriodToken::Custom,
];

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// A non-empty raw table and how it was obtained.
#[derive(Debug, Clone)]
pub struct FetchedTable {
    pub table: RawTable,
    /// Window that produced the data; differs from the request when degraded.
    pub window: FetchWindow,
    pub label: &'static str,
    pub attempts: u32,
    pub degraded: bool,
    pub cache_hit: bool,
}

/// Outcome of the retry loop at one ladder step.
enum WindowOutcome {
    Data(RawTable),
    Exhausted {
        saw_empty: bool,
        last_error: Option<ProviderError>,
    },
    NotFound(String),
    Permanent(ProviderError),
}

/// What a cached result answers for.
///
/// Relative periods resolve against the clock, so their windows move on every
/// call; they are keyed by token. Custom ranges are keyed by their window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RequestKey {
    Relative(PeriodToken, Interval),
    Fixed(FetchWindow),
}

impl RequestKey {
    fn new(period: PeriodToken, window: FetchWindow) -> Self {
        match period {
            PeriodToken::Custom => RequestKey::Fixed(window),
            _ => RequestKey::Relative(period, window.interval),
        }
    }
}

type CacheKey = (String, RequestKey);

pub struct SourceFetcher {
    port: Arc<dyn MarketDataPort>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    cache: FetchCache<CacheKey, FetchedTable>,
}

impl SourceFetcher {
    pub fn new(
        port: Arc<dyn MarketDataPort>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            port,
            sleeper,
            policy,
            cache: FetchCache::new(cache_ttl),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `symbol` over `window`, degrading along the fallback ladder.
    ///
    /// `period` labels the first ladder step and appears in errors.
    pub fn fetch(
        &self,
        symbol: &str,
        period: PeriodToken,
        window: FetchWindow,
        cancel: &CancelToken,
    ) -> Result<FetchedTable, AnalyticsError> {
        let symbol = validate_symbol(symbol)?;
        let key = (symbol.to_string(), RequestKey::new(period, window));
        let (mut fetched, hit) = self
            .cache
            .get_or_fetch(key, || self.fetch_uncached(symbol, period, window, cancel))?;
        if hit {
            debug!(symbol, %window, "fetch cache hit");
        }
        fetched.cache_hit = hit;
        Ok(fetched)
    }

    fn fetch_uncached(
        &self,
        symbol: &str,
        period: PeriodToken,
        window: FetchWindow,
        cancel: &CancelToken,
    ) -> Result<FetchedTable, AnalyticsError> {
        let ladder = FallbackLadder::for_request(period.as_str(), window);
        let mut attempted = Vec::with_capacity(ladder.len());
        let mut attempts = 0u32;
        let mut saw_empty = false;
        let mut last_error = None;

        for (step_no, step) in ladder.steps().iter().enumerate() {
            attempted.push(step.label.to_string());
            if step_no > 0 {
                info!(symbol, step = step.label, window = %step.window, "falling back");
            }

            match self.fetch_window(symbol, &step.window, cancel, &mut attempts)? {
                WindowOutcome::Data(table) => {
                    info!(
                        symbol,
                        rows = table.len(),
                        attempts,
                        step = step.label,
                        "fetched"
                    );
                    return Ok(FetchedTable {
                        table,
                        window: step.window,
                        label: step.label,
                        attempts,
                        degraded: step_no > 0,
                        cache_hit: false,
                    });
                }
                WindowOutcome::Exhausted {
                    saw_empty: empty,
                    last_error: err,
                } => {
                    saw_empty |= empty;
                    if err.is_some() {
                        last_error = err;
                    }
                }
                WindowOutcome::NotFound(reason) => {
                    warn!(symbol, %reason, "provider does not know symbol");
                    return Err(self.no_data(symbol, period, attempted));
                }
                WindowOutcome::Permanent(err) => {
                    warn!(symbol, error = %err, "permanent provider failure");
                    return Err(AnalyticsError::Network {
                        symbol: symbol.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if saw_empty {
            Err(self.no_data(symbol, period, attempted))
        } else {
            Err(AnalyticsError::Network {
                symbol: symbol.to_string(),
                reason: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no attempt was made".to_string()),
            })
        }
    }

    fn fetch_window(
        &self,
        symbol: &str,
        window: &FetchWindow,
        cancel: &CancelToken,
        attempts: &mut u32,
    ) -> Result<WindowOutcome, AnalyticsError> {
        let mut saw_empty = false;
        let mut last_error = None;
        let mut state = self.policy.start();

        while let AttemptState::Attempting(n) = state {
            check_cancel(symbol, cancel)?;
            *attempts += 1;

            let table = match self.port.fetch(symbol, window) {
                Ok(table) if !table.is_empty() => Some(table),
                Ok(_) => {
                    warn!(symbol, attempt = n, %window, "provider returned no rows");
                    saw_empty = true;
                    None
                }
                Err(ProviderError::SymbolNotFound(reason)) => {
                    return Ok(WindowOutcome::NotFound(reason));
                }
                Err(err) if err.is_retryable() => {
                    warn!(symbol, attempt = n, error = %err, "fetch attempt failed");
                    last_error = Some(err);
                    None
                }
                Err(err) => return Ok(WindowOutcome::Permanent(err)),
            };

            state = self.policy.next(n, table.is_some());
            if let Some(table) = table {
                return Ok(WindowOutcome::Data(table));
            }
            if let AttemptState::Attempting(_) = state {
                let delay = self.policy.backoff_delay(n);
                debug!(symbol, delay_ms = delay.as_millis() as u64, "backing off");
                self.sleeper.sleep(delay);
                check_cancel(symbol, cancel)?;
            }
        }

        Ok(WindowOutcome::Exhausted {
            saw_empty,
            last_error,
        })
    }

    fn no_data(
        &self,
        symbol: &str,
        period: PeriodToken,
        attempted: Vec<String>,
    ) -> AnalyticsError {
        let available_range = match self.port.available_range(symbol) {
            Ok(range) => range,
            Err(err) => {
                debug!(symbol, error = %err, "available range lookup failed");
                None
            }
        };
        AnalyticsError::NoDataFound {
            symbol: symbol.to_string(),
            period: period.to_string(),
            attempted,
            available_range,
            suggestions: SUGGESTED_PERIODS
                .iter()
                .filter(|t| **t != period)
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

fn check_cancel(symbol: &str, cancel: &CancelToken) -> Result<(), AnalyticsError> {
    if cancel.is_cancelled() {
        info!(symbol, "fetch cancelled");
        Err(AnalyticsError::Cancelled {
            symbol: symbol.to_string(),
        })
    } else {
        Ok(())
    }
}

/// A normalized series together with its fetch metadata.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: OhlcvSeries,
    pub window: FetchWindow,
    pub label: &'static str,
    pub attempts: u32,
    pub degraded: bool,
    pub cache_hit: bool,
}

/// Resolve the period, fetch and normalize.
pub fn load_symbol(
    fetcher: &SourceFetcher,
    symbol: &str,
    period: PeriodToken,
    custom: Option<CustomRange>,
    now: NaiveDateTime,
    cancel: &CancelToken,
) -> Result<LoadedSeries, AnalyticsError> {
    let window = period::resolve(period, custom, now)?;
    let fetched = fetcher.fetch(symbol, period, window, cancel)?;
    let series = normalize::normalize(fetched.table)?;
    Ok(LoadedSeries {
        series,
        window: fetched.window,
        label: fetched.label,
        attempts: fetched.attempts,
        degraded: fetched.degraded,
        cache_hit: fetched.cache_hit,
    })
}
