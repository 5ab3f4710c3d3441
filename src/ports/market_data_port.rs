//! Market data provider port.

use crate::domain::error::DateRange;
use crate::domain::normalize::RawTable;
use crate::domain::period::FetchWindow;

/// Provider-level failure, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Timeouts, connection resets, 5xx responses.
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// Authentication failures and responses that no longer parse.
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Whether another attempt at the same window may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::RateLimited(_))
    }
}

pub trait MarketDataPort: Send + Sync {
    /// Fetch the raw table for `symbol` over `window`.
    ///
    /// An empty table is a valid answer; the fetcher decides what it means.
    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<RawTable, ProviderError>;

    /// First and last trading date the provider knows for `symbol`.
    fn available_range(&self, symbol: &str) -> Result<Option<DateRange>, ProviderError>;
}

/// Blocking wait between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: std::time::Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: std::time::Duration) {
        std::thread::sleep(duration);
    }
}
