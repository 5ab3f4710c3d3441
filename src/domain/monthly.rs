//! Year × month table of mean percentage P/L.

use crate::domain::pl::PlRecord;
use chrono::Datelike;
use std::collections::BTreeMap;

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPlRow {
    pub year: i32,
    /// Mean `pl_pct` for January through December; 0.0 where a month has no data.
    pub months: [f64; 12],
}

pub fn monthly_pl_table(records: &[PlRecord]) -> Vec<MonthlyPlRow> {
    let mut sums: BTreeMap<i32, [(f64, usize); 12]> = BTreeMap::new();
    for r in records {
        let year = r.timestamp.year();
        let month = r.timestamp.month0() as usize;
        let cells = sums.entry(year).or_insert([(0.0, 0); 12]);
        if !r.pl_pct.is_nan() {
            cells[month].0 += r.pl_pct;
            cells[month].1 += 1;
        }
    }

    sums.into_iter()
        .map(|(year, cells)| MonthlyPlRow {
            year,
            months: cells.map(|(sum, n)| if n == 0 { 0.0 } else { sum / n as f64 }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(y: i32, m: u32, d: u32, pl_pct: f64) -> PlRecord {
        PlRecord {
            timestamp: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
            pl_value: 0.0,
            pl_pct,
            z_pl: 0.0,
            z_volume: 0.0,
            anomaly: false,
        }
    }

    #[test]
    fn averages_per_month_and_fills_zero() {
        let table = monthly_pl_table(&[
            record(2023, 12, 1, 1.0),
            record(2024, 1, 2, 1.0),
            record(2024, 1, 3, 2.0),
            record(2024, 3, 1, -0.5),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].year, 2023);
        assert_relative_eq!(table[0].months[11], 1.0);
        assert_eq!(table[0].months[0], 0.0);
        assert_eq!(table[1].year, 2024);
        assert_relative_eq!(table[1].months[0], 1.5);
        assert_eq!(table[1].months[1], 0.0);
        assert_relative_eq!(table[1].months[2], -0.5);
    }

    #[test]
    fn nan_values_are_skipped() {
        let table = monthly_pl_table(&[record(2024, 2, 1, f64::NAN), record(2024, 2, 2, 3.0)]);
        assert_relative_eq!(table[0].months[1], 3.0);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        assert!(monthly_pl_table(&[]).is_empty());
    }
}
