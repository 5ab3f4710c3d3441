//! Schema normalization from raw provider or file tables to [`OhlcvSeries`].
//!
//! [`normalize`] runs the steps in a fixed order: collapse and lowercase the
//! headers, select the required columns, reject empty tables, validate the
//! index, then strip timezones, sort and de-duplicate. Each step is public so
//! callers and tests can run them individually.

use crate::domain::error::AnalyticsError;
use crate::domain::ohlcv::{OhlcvBar, OhlcvSeries};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

/// Canonical column order of a normalized table.
pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// A possibly multi-level column header, outermost level first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub levels: Vec<String>,
}

impl ColumnHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            levels: vec![name.into()],
        }
    }

    pub fn multi<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }

    /// Outermost level, or "" for a header without levels.
    pub fn top(&self) -> &str {
        self.levels.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
    /// Unparsed text; resolved or rejected by [`validate_index`].
    Text(String),
}

impl IndexValue {
    /// Wall-clock timestamp, or `None` for text.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            IndexValue::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            IndexValue::Naive(t) => Some(*t),
            IndexValue::Zoned(t) => Some(t.naive_local()),
            IndexValue::Text(_) => None,
        }
    }
}

/// Parse a textual index cell into a date-like value.
pub fn parse_index_text(text: &str) -> Option<IndexValue> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(IndexValue::Zoned(t));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Some(IndexValue::Zoned(t));
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(IndexValue::Naive(t));
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(IndexValue::Date(d));
        }
    }
    None
}

/// Pre-normalization table: headers, an index column and numeric cells.
///
/// `rows[i]` belongs to `index[i]` and has one cell per header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<ColumnHeader>,
    pub index: Vec<IndexValue>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl RawTable {
    pub fn new(
        headers: Vec<ColumnHeader>,
        index: Vec<IndexValue>,
        rows: Vec<Vec<Option<f64>>>,
    ) -> Self {
        Self {
            headers,
            index,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column whose top level equals `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.top() == name)
    }
}

/// (a) Keep only the outermost level of every header.
pub fn collapse_headers(mut table: RawTable) -> RawTable {
    for header in &mut table.headers {
        header.levels.truncate(1);
    }
    table
}

/// (b) Lowercase and trim every header level.
pub fn lowercase_headers(mut table: RawTable) -> RawTable {
    for header in &mut table.headers {
        for level in &mut header.levels {
            *level = level.trim().to_lowercase();
        }
    }
    table
}

/// (f) Restrict to [`REQUIRED_COLUMNS`] in canonical order.
pub fn select_required(table: RawTable) -> Result<RawTable, AnalyticsError> {
    let positions: Vec<Option<usize>> =
        REQUIRED_COLUMNS.iter().map(|name| table.column(name)).collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .zip(&positions)
        .filter(|(_, pos)| pos.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AnalyticsError::MissingColumns { columns: missing });
    }

    let positions: Vec<usize> = positions.into_iter().flatten().collect();
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            positions
                .iter()
                .map(|&p| row.get(p).copied().flatten())
                .collect()
        })
        .collect();

    Ok(RawTable {
        headers: REQUIRED_COLUMNS.iter().map(|n| ColumnHeader::new(*n)).collect(),
        index: table.index,
        rows,
    })
}

/// (g) Reject a table without rows.
pub fn ensure_not_empty(table: RawTable) -> Result<RawTable, AnalyticsError> {
    if table.is_empty() {
        Err(AnalyticsError::EmptyDataset)
    } else {
        Ok(table)
    }
}

/// (h) Resolve textual index values and reject anything not date-like.
pub fn validate_index(mut table: RawTable) -> Result<RawTable, AnalyticsError> {
    if table.index.len() != table.rows.len() {
        return Err(AnalyticsError::InvalidIndex {
            reason: format!(
                "{} index values for {} rows",
                table.index.len(),
                table.rows.len()
            ),
        });
    }
    for (pos, value) in table.index.iter_mut().enumerate() {
        if let IndexValue::Text(text) = value {
            *value = parse_index_text(text).ok_or_else(|| AnalyticsError::InvalidIndex {
                reason: format!("row {pos}: '{text}' is not a date"),
            })?;
        }
    }
    Ok(table)
}

/// (e) Replace zoned timestamps by their wall-clock time.
pub fn strip_timezone(mut table: RawTable) -> RawTable {
    for value in &mut table.index {
        if let IndexValue::Zoned(t) = value {
            *value = IndexValue::Naive(t.naive_local());
        }
    }
    table
}

/// (c) Stable sort of rows by index; text values sort last.
pub fn sort_by_index(table: RawTable) -> RawTable {
    let mut pairs: Vec<(IndexValue, Vec<Option<f64>>)> =
        table.index.into_iter().zip(table.rows).collect();
    pairs.sort_by_key(|(idx, _)| (idx.timestamp().is_none(), idx.timestamp()));
    let (index, rows) = pairs.into_iter().unzip();
    RawTable {
        headers: table.headers,
        index,
        rows,
    }
}

/// (d) Drop rows whose timestamp repeats an earlier row, keeping the first.
///
/// Expects a sorted table.
pub fn drop_duplicate_index(table: RawTable) -> RawTable {
    let before = table.rows.len();
    let mut index = Vec::with_capacity(before);
    let mut rows = Vec::with_capacity(before);
    let mut last: Option<NaiveDateTime> = None;

    for (idx, row) in table.index.into_iter().zip(table.rows) {
        let ts = idx.timestamp();
        if ts.is_some() && ts == last {
            continue;
        }
        last = ts;
        index.push(idx);
        rows.push(row);
    }

    let dropped = before - rows.len();
    if dropped > 0 {
        warn!(dropped, "dropped rows with duplicate timestamps");
    }
    RawTable {
        headers: table.headers,
        index,
        rows,
    }
}

/// Run every normalization step and build the canonical series.
pub fn normalize(table: RawTable) -> Result<OhlcvSeries, AnalyticsError> {
    let table = lowercase_headers(collapse_headers(table));
    let table = select_required(table)?;
    let table = ensure_not_empty(table)?;
    let table = validate_index(table)?;
    let table = drop_duplicate_index(sort_by_index(strip_timezone(table)));
    debug!(rows = table.len(), "normalized table");
    into_series(table)
}

fn into_series(table: RawTable) -> Result<OhlcvSeries, AnalyticsError> {
    let bars = table
        .index
        .iter()
        .zip(&table.rows)
        .map(|(idx, row)| {
            let timestamp = idx.timestamp().ok_or_else(|| AnalyticsError::InvalidIndex {
                reason: format!("{idx:?} is not a date"),
            })?;
            let cell = |i: usize| row.get(i).copied().flatten();
            Ok(OhlcvBar {
                timestamp,
                open: price(cell(0), "open", timestamp)?,
                high: price(cell(1), "high", timestamp)?,
                low: price(cell(2), "low", timestamp)?,
                close: price(cell(3), "close", timestamp)?,
                volume: volume(cell(4), timestamp)?,
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;
    OhlcvSeries::from_bars(bars)
}

fn price(cell: Option<f64>, column: &str, at: NaiveDateTime) -> Result<f64, AnalyticsError> {
    match cell {
        None => Ok(f64::NAN),
        Some(v) if v < 0.0 => Err(AnalyticsError::MalformedData {
            reason: format!("negative {column} {v} at {at}"),
        }),
        Some(v) => Ok(v),
    }
}

fn volume(cell: Option<f64>, at: NaiveDateTime) -> Result<u64, AnalyticsError> {
    match cell {
        None => Ok(0),
        Some(v) if v.is_nan() => Ok(0),
        Some(v) if v < 0.0 || !v.is_finite() || v.fract() != 0.0 || v > u64::MAX as f64 => {
            Err(AnalyticsError::MalformedData {
                reason: format!("volume {v} at {at} is not a non-negative integer"),
            })
        }
        Some(v) => Ok(v as u64),
    }
}
