//! Uploaded file loader: CSV via `csv`, spreadsheets via `calamine`.
//!
//! The first column is the index. Besides a plain single header row, the
//! multi-row layout written by yfinance is understood:
//!
//! ```text
//! Price,Close,High,Low,Open,Volume
//! Ticker,AAPL,AAPL,AAPL,AAPL,AAPL
//! Date,,,,,
//! 2024-01-02,185.6,188.4,183.9,187.2,82488700
//! ```
//!
//! The result is a [`RawTable`]; column checks and date parsing are left to
//! the normalizer.

use crate::domain::error::AnalyticsError;
use crate::domain::normalize::{parse_index_text, ColumnHeader, IndexValue, RawTable};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Header rows beyond the first that may precede the data.
const MAX_EXTRA_HEADER_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn from_text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn from_sheet(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    fn label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::DateTime(t) => t.to_string(),
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            Cell::Number(_) => true,
            Cell::Text(s) => s.parse::<f64>().is_ok(),
            _ => false,
        }
    }

    fn is_date_like(&self) -> bool {
        match self {
            Cell::DateTime(_) => true,
            Cell::Text(s) => parse_index_text(s).is_some(),
            _ => false,
        }
    }
}

/// Load `path`, choosing the reader from its extension.
pub fn load_file(path: &Path) -> Result<RawTable, AnalyticsError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" => load_csv_str(&fs::read_to_string(path)?)?,
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(path)?,
        other => {
            return Err(AnalyticsError::MalformedData {
                reason: format!(
                    "unsupported file type '{other}' for {}; expected csv, xlsx, xls or ods",
                    path.display()
                ),
            });
        }
    };
    info!(path = %path.display(), rows = table.len(), "loaded file");
    Ok(table)
}

pub fn load_csv_str(content: &str) -> Result<RawTable, AnalyticsError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| AnalyticsError::MalformedData {
            reason: format!("CSV parse error: {}", e),
        })?;
        grid.push(record.iter().map(Cell::from_text).collect());
    }
    build_table(grid)
}

fn load_spreadsheet(path: &Path) -> Result<RawTable, AnalyticsError> {
    let sheet_error = |e: calamine::Error| AnalyticsError::MalformedData {
        reason: format!("failed to read {}: {}", path.display(), e),
    };
    let mut workbook = open_workbook_auto(path).map_err(sheet_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalyticsError::MalformedData {
            reason: format!("{} has no worksheets", path.display()),
        })?
        .map_err(sheet_error)?;

    let grid = range
        .rows()
        .map(|row| row.iter().map(Cell::from_sheet).collect())
        .collect();
    build_table(grid)
}

fn build_table(grid: Vec<Vec<Cell>>) -> Result<RawTable, AnalyticsError> {
    let mut rows = grid
        .into_iter()
        .filter(|r: &Vec<Cell>| !r.iter().all(Cell::is_empty));
    let Some(first) = rows.next() else {
        return Ok(RawTable::default());
    };

    let width = first.len().saturating_sub(1);
    let mut headers: Vec<ColumnHeader> = first
        .iter()
        .skip(1)
        .map(|c| ColumnHeader::new(c.label()))
        .collect();

    let mut rows = rows.peekable();
    let mut extra = 0;
    while extra < MAX_EXTRA_HEADER_ROWS {
        let Some(row) = rows.peek() else { break };
        if !is_header_row(row) {
            break;
        }
        let values = &row[1..];
        if !values.iter().all(Cell::is_empty) {
            for (header, cell) in headers.iter_mut().zip(values) {
                header.levels.push(cell.label());
            }
        }
        debug!(label = %row[0].label(), "skipping extra header row");
        rows.next();
        extra += 1;
    }

    let mut index = Vec::new();
    let mut cells = Vec::new();
    for (line, row) in rows.enumerate() {
        let idx = match row.first() {
            Some(Cell::DateTime(t)) => IndexValue::Naive(*t),
            Some(other) => IndexValue::Text(other.label()),
            None => IndexValue::Text(String::new()),
        };
        let values = (0..width)
            .map(|col| value(row.get(col + 1).unwrap_or(&Cell::Empty), line))
            .collect::<Result<Vec<_>, _>>()?;
        index.push(idx);
        cells.push(values);
    }

    Ok(RawTable::new(headers, index, cells))
}

/// A non-data row: its first cell is not a date and no other cell is numeric.
fn is_header_row(row: &[Cell]) -> bool {
    let Some(first) = row.first() else {
        return false;
    };
    !first.is_date_like() && !row[1..].iter().any(Cell::is_numeric)
}

fn value(cell: &Cell, line: usize) -> Result<Option<f64>, AnalyticsError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) => Ok(Some(*n)),
        Cell::Text(s) => match s.to_lowercase().as_str() {
            "nan" | "null" | "none" => Ok(None),
            _ => s.parse().map(Some).map_err(|_| AnalyticsError::MalformedData {
                reason: format!("data row {}: '{}' is not a number", line + 1, s),
            }),
        },
        Cell::DateTime(t) => Err(AnalyticsError::MalformedData {
            reason: format!("data row {}: unexpected date {} in a value column", line + 1, t),
        }),
    }
}
