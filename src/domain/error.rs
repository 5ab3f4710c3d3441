//! Domain error types.

use chrono::NaiveDate;
use std::fmt;

/// First and last trading date a provider reports for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.first, self.last)
    }
}

/// Top-level error type for stockpulse.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("unknown period '{token}'")]
    UnknownPeriod { token: String },

    #[error("invalid date range: {reason}")]
    InvalidRange { reason: String },

    #[error("invalid symbol '{symbol}': expected letters, digits, '.' or '-'")]
    InvalidSymbol { symbol: String },

    #[error("{}", no_data_message(.symbol, .period, .attempted, .available_range, .suggestions))]
    NoDataFound {
        symbol: String,
        period: String,
        attempted: Vec<String>,
        available_range: Option<DateRange>,
        suggestions: Vec<String>,
    },

    #[error("network error fetching {symbol}: {reason}")]
    Network { symbol: String, reason: String },

    #[error("fetch for {symbol} cancelled")]
    Cancelled { symbol: String },

    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("dataset contains no rows")]
    EmptyDataset,

    #[error("index is not date-like: {reason}")]
    InvalidIndex { reason: String },

    #[error("malformed data: {reason}")]
    MalformedData { reason: String },

    #[error("invalid forecast horizon {horizon}: must be at least 1")]
    InvalidHorizon { horizon: usize },

    #[error("forecast unavailable: {reason}")]
    ForecastUnavailable { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn no_data_message(
    symbol: &str,
    period: &str,
    attempted: &[String],
    available_range: &Option<DateRange>,
    suggestions: &[String],
) -> String {
    let mut msg = format!("no data found for {symbol} in period {period}");
    if !attempted.is_empty() {
        msg.push_str(&format!(" (tried {})", attempted.join(", ")));
    }
    if let Some(range) = available_range {
        msg.push_str(&format!("; data is available from {range}"));
    }
    if !suggestions.is_empty() {
        msg.push_str(&format!(
            "; try a period like {}, another symbol, or a file import",
            suggestions.join(", ")
        ));
    }
    msg
}

impl From<&AnalyticsError> for std::process::ExitCode {
    fn from(err: &AnalyticsError) -> Self {
        let code: u8 = match err {
            AnalyticsError::Io(_) => 1,
            AnalyticsError::ConfigParse { .. } | AnalyticsError::ConfigInvalid { .. } => 2,
            AnalyticsError::UnknownPeriod { .. }
            | AnalyticsError::InvalidRange { .. }
            | AnalyticsError::InvalidSymbol { .. }
            | AnalyticsError::InvalidHorizon { .. } => 3,
            AnalyticsError::NoDataFound { .. }
            | AnalyticsError::Network { .. }
            | AnalyticsError::Cancelled { .. } => 4,
            AnalyticsError::MissingColumns { .. }
            | AnalyticsError::EmptyDataset
            | AnalyticsError::InvalidIndex { .. }
            | AnalyticsError::MalformedData { .. } => 5,
            AnalyticsError::ForecastUnavailable { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
