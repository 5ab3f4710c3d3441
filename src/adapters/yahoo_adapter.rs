//! Yahoo Finance market data adapter.
//!
//! Reads Yahoo's v8 chart API with a blocking client. Retries are left to
//! the fetcher; this adapter makes exactly one request per call and
//! classifies the failure.

use crate::domain::error::DateRange;
use crate::domain::normalize::{ColumnHeader, IndexValue, RawTable};
use crate::domain::period::{FetchWindow, Interval};
use crate::ports::market_data_port::{MarketDataPort, ProviderError};
use chrono::{DateTime, FixedOffset};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
    #[serde(rename = "firstTradeDate")]
    first_trade_date: Option<i64>,
    #[serde(rename = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(timeout: Duration, user_agent: &str) -> std::io::Result<Self> {
        Self::with_base_url(timeout, user_agent, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        timeout: Duration,
        user_agent: &str,
        base_url: &str,
    ) -> std::io::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str, window: &FetchWindow) -> String {
        let start_ts = window.start.and_utc().timestamp();
        let end_ts = window.end.and_utc().timestamp();
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval={}\
             &includeAdjustedClose=true",
            self.base_url, window.interval
        )
    }

    fn range_url(&self, symbol: &str) -> String {
        format!("{}/{symbol}?range=5d&interval=1d", self.base_url)
    }

    fn get_chart(&self, symbol: &str, url: &str) -> Result<ChartResponse, ProviderError> {
        debug!(symbol, url, "requesting chart");
        // Timeouts, refused connections and resets are all worth retrying.
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::Transient(format!("request for {symbol} failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(format!("HTTP {status} for {symbol}")));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound(symbol.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Permanent(format!("HTTP {status} for {symbol}")));
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!("HTTP {status} for {symbol}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Permanent(format!("HTTP {status} for {symbol}")));
        }

        let body = resp
            .text()
            .map_err(|e| ProviderError::Transient(format!("reading body for {symbol}: {e}")))?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::Permanent(format!("failed to parse response for {symbol}: {e}"))
        })
    }
}

impl MarketDataPort for YahooAdapter {
    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<RawTable, ProviderError> {
        let chart = self.get_chart(symbol, &self.chart_url(symbol, window))?;
        parse_chart(symbol, window.interval, chart)
    }

    fn available_range(&self, symbol: &str) -> Result<Option<DateRange>, ProviderError> {
        let chart = self.get_chart(symbol, &self.range_url(symbol))?;
        let data = first_result(symbol, chart)?;
        Ok(data.meta.and_then(|meta| {
            let first = DateTime::from_timestamp(meta.first_trade_date?, 0)?.date_naive();
            let last = DateTime::from_timestamp(meta.regular_market_time?, 0)?.date_naive();
            Some(DateRange { first, last })
        }))
    }
}

fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, ProviderError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound(symbol.to_string()),
        Some(err) => ProviderError::Permanent(format!("{}: {}", err.code, err.description)),
        None => ProviderError::Permanent("empty result with no error".into()),
    })?;
    result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Permanent("result array is empty".into()))
}

/// Convert a chart response into a raw table with Yahoo's column names.
///
/// Daily rows are indexed by exchange-local date, intraday rows by zoned
/// timestamp. Rows where every field is null are skipped.
fn parse_chart(
    symbol: &str,
    interval: Interval,
    resp: ChartResponse,
) -> Result<RawTable, ProviderError> {
    let data = first_result(symbol, resp)?;
    let Some(timestamps) = data.timestamp else {
        return Ok(RawTable::default());
    };

    let offset_secs = data.meta.as_ref().map(|m| m.gmtoffset).unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| ProviderError::Permanent(format!("invalid gmtoffset {offset_secs}")))?;

    let indicators = data
        .indicators
        .ok_or_else(|| ProviderError::Permanent("no indicators".into()))?;
    let adj_close = indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);
    let quote = indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Permanent("no quote data".into()))?;

    let mut headers: Vec<ColumnHeader> = ["Open", "High", "Low", "Close", "Volume"]
        .into_iter()
        .map(ColumnHeader::new)
        .collect();
    if adj_close.is_some() {
        headers.push(ColumnHeader::new("Adj Close"));
    }

    let mut index = Vec::with_capacity(timestamps.len());
    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let cell = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
        let mut row = vec![
            cell(&quote.open),
            cell(&quote.high),
            cell(&quote.low),
            cell(&quote.close),
            cell(&quote.volume),
        ];
        if row.iter().all(Option::is_none) {
            continue;
        }
        if let Some(adj) = &adj_close {
            row.push(cell(adj));
        }

        let at = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| ProviderError::Permanent(format!("invalid timestamp: {ts}")))?
            .with_timezone(&offset);
        index.push(match interval {
            Interval::Daily => IndexValue::Date(at.date_naive()),
            Interval::Minute => IndexValue::Zoned(at),
        });
        rows.push(row);
    }

    Ok(RawTable::new(headers, index, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(json: &str, interval: Interval) -> Result<RawTable, ProviderError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_chart("AAPL", interval, resp)
    }

    const DAILY: &str = r#"{"chart":{"result":[{
        "meta":{"gmtoffset":-14400,"firstTradeDate":345479400,"regularMarketTime":1718395201},
        "timestamp":[1718199000,1718285400,1718371800],
        "indicators":{
            "quote":[{"open":[207.4,214.7,null],"high":[220.2,216.0,null],
                      "low":[206.9,211.6,null],"close":[213.0,214.2,null],
                      "volume":[198134300,97862700,null]}],
            "adjclose":[{"adjclose":[212.5,213.7,null]}]}
    }],"error":null}}"#;

    #[test]
    fn parses_daily_chart() {
        let table = parse(DAILY, Interval::Daily).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.headers[5].top(), "Adj Close");
        assert_eq!(
            table.index[0],
            IndexValue::Date(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap())
        );
        assert_eq!(table.rows[1][3], Some(214.2));
        assert_eq!(table.rows[0][4], Some(198134300.0));
    }

    #[test]
    fn intraday_chart_keeps_zone() {
        let table = parse(DAILY, Interval::Minute).unwrap();
        match &table.index[0] {
            IndexValue::Zoned(t) => assert_eq!(t.offset().local_minus_utc(), -14400),
            other => panic!("expected zoned index, got {other:?}"),
        }
    }

    #[test]
    fn missing_timestamps_is_empty_table() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse(json, Interval::Daily).unwrap().is_empty());
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert_eq!(
            parse(json, Interval::Daily).unwrap_err(),
            ProviderError::SymbolNotFound("AAPL".into())
        );
    }

    #[test]
    fn other_chart_error_is_permanent() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(
            parse(json, Interval::Daily),
            Err(ProviderError::Permanent(_))
        ));
    }

    #[test]
    fn chart_url_carries_window_and_interval() {
        let adapter =
            YahooAdapter::with_base_url(Duration::from_secs(5), "test", "http://localhost/chart/")
                .unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let url = adapter.chart_url("AAPL", &FetchWindow::trailing_days(end, 5));
        assert!(url.starts_with("http://localhost/chart/AAPL?period1=1717977600&period2=1718409600"));
        assert!(url.contains("interval=1d"));
    }
}
