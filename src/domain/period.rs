//! Period resolution: symbolic period tokens to concrete fetch windows.
//!
//! Resolution is a pure function of the token, the optional custom dates and
//! the caller-supplied "now".

use crate::domain::error::AnalyticsError;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Daily,
    Minute,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Minute => "1m",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodToken {
    OneDay,
    FiveDays,
    FifteenDays,
    ThirtyDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    TwoYears,
    ThreeYears,
    FiveYears,
    Max,
    Custom,
    RealTime,
}

impl PeriodToken {
    pub const ALL: [PeriodToken; 15] = [
        PeriodToken::OneDay,
        PeriodToken::FiveDays,
        PeriodToken::FifteenDays,
        PeriodToken::ThirtyDays,
        PeriodToken::OneMonth,
        PeriodToken::ThreeMonths,
        PeriodToken::SixMonths,
        PeriodToken::YearToDate,
        PeriodToken::OneYear,
        PeriodToken::TwoYears,
        PeriodToken::ThreeYears,
        PeriodToken::FiveYears,
        PeriodToken::Max,
        PeriodToken::Custom,
        PeriodToken::RealTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodToken::OneDay => "1D",
            PeriodToken::FiveDays => "5D",
            PeriodToken::FifteenDays => "15D",
            PeriodToken::ThirtyDays => "30D",
            PeriodToken::OneMonth => "1M",
            PeriodToken::ThreeMonths => "3M",
            PeriodToken::SixMonths => "6M",
            PeriodToken::YearToDate => "YTD",
            PeriodToken::OneYear => "1Y",
            PeriodToken::TwoYears => "2Y",
            PeriodToken::ThreeYears => "3Y",
            PeriodToken::FiveYears => "5Y",
            PeriodToken::Max => "MAX",
            PeriodToken::Custom => "Custom",
            PeriodToken::RealTime => "real-time",
        }
    }

    /// Fixed look-back in calendar days, for tokens that have one.
    fn lookback_days(&self) -> Option<i64> {
        match self {
            PeriodToken::OneDay => Some(1),
            PeriodToken::FiveDays => Some(5),
            PeriodToken::FifteenDays => Some(15),
            PeriodToken::ThirtyDays | PeriodToken::OneMonth => Some(30),
            PeriodToken::ThreeMonths => Some(90),
            PeriodToken::SixMonths => Some(180),
            PeriodToken::OneYear => Some(365),
            PeriodToken::TwoYears => Some(730),
            PeriodToken::ThreeYears => Some(1095),
            PeriodToken::FiveYears => Some(1825),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodToken {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PeriodToken::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AnalyticsError::UnknownPeriod {
                token: s.to_string(),
            })
    }
}

/// Explicit dates supplied with a `Custom` period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A concrete `(start, end, interval)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval: Interval,
}

impl FetchWindow {
    /// Daily window covering the `days` calendar days that end at `end`.
    pub fn trailing_days(end: NaiveDateTime, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
            interval: Interval::Daily,
        }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {} @ {}",
            self.start.date(),
            self.end.date(),
            self.interval
        )
    }
}

/// Resolve `token` against `now`.
///
/// `custom` is only consulted for [`PeriodToken::Custom`].
pub fn resolve(
    token: PeriodToken,
    custom: Option<CustomRange>,
    now: NaiveDateTime,
) -> Result<FetchWindow, AnalyticsError> {
    if let Some(days) = token.lookback_days() {
        return Ok(FetchWindow::trailing_days(now, days));
    }

    match token {
        PeriodToken::YearToDate => {
            let jan_first = NaiveDate::from_ymd_opt(now.year(), 1, 1)
                .ok_or_else(|| AnalyticsError::InvalidRange {
                    reason: format!("no January 1 in year {}", now.year()),
                })?
                .and_time(NaiveTime::MIN);
            Ok(FetchWindow {
                start: jan_first,
                end: now,
                interval: Interval::Daily,
            })
        }
        PeriodToken::Max => Ok(FetchWindow {
            // NaiveDate's default is 1970-01-01
            start: NaiveDate::default().and_time(NaiveTime::MIN),
            end: now,
            interval: Interval::Daily,
        }),
        PeriodToken::RealTime => Ok(FetchWindow {
            start: now - Duration::days(1),
            end: now,
            interval: Interval::Minute,
        }),
        PeriodToken::Custom => resolve_custom(custom, now),
        _ => Err(AnalyticsError::UnknownPeriod {
            token: token.to_string(),
        }),
    }
}

fn resolve_custom(
    custom: Option<CustomRange>,
    now: NaiveDateTime,
) -> Result<FetchWindow, AnalyticsError> {
    let range = custom.ok_or_else(|| AnalyticsError::InvalidRange {
        reason: "Custom period requires a start and end date".into(),
    })?;

    if range.start >= range.end {
        return Err(AnalyticsError::InvalidRange {
            reason: format!(
                "start date {} must be before end date {}",
                range.start, range.end
            ),
        });
    }
    if range.end > now.date() {
        return Err(AnalyticsError::InvalidRange {
            reason: format!("end date {} is in the future", range.end),
        });
    }

    Ok(FetchWindow {
        start: range.start.and_time(NaiveTime::MIN),
        end: range.end.and_time(NaiveTime::MIN),
        interval: Interval::Daily,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_every_token_case_insensitively() {
        for token in PeriodToken::ALL {
            assert_eq!(token.as_str().parse::<PeriodToken>().unwrap(), token);
            assert_eq!(
                token.as_str().to_lowercase().parse::<PeriodToken>().unwrap(),
                token
            );
        }
    }

    #[test]
    fn unknown_token_fails() {
        let err = "10Y".parse::<PeriodToken>().unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownPeriod { token } if token == "10Y"));
    }

    #[test]
    fn one_year_is_365_days_daily() {
        let w = resolve(PeriodToken::OneYear, None, now()).unwrap();
        assert_eq!(w.end, now());
        assert_eq!(w.start, now() - Duration::days(365));
        assert_eq!(w.interval, Interval::Daily);
    }

    #[test]
    fn month_tokens_share_thirty_days() {
        let a = resolve(PeriodToken::OneMonth, None, now()).unwrap();
        let b = resolve(PeriodToken::ThirtyDays, None, now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ytd_starts_january_first() {
        let w = resolve(PeriodToken::YearToDate, None, now()).unwrap();
        assert_eq!(w.start.date(), date(2024, 1, 1));
        assert_eq!(w.end, now());
    }

    #[test]
    fn max_starts_at_epoch() {
        let w = resolve(PeriodToken::Max, None, now()).unwrap();
        assert_eq!(w.start.date(), date(1970, 1, 1));
        assert_eq!(w.interval, Interval::Daily);
    }

    #[test]
    fn real_time_uses_minute_interval() {
        let w = resolve(PeriodToken::RealTime, None, now()).unwrap();
        assert_eq!(w.interval, Interval::Minute);
        assert_eq!(w.interval.as_str(), "1m");
        for token in PeriodToken::ALL {
            if token == PeriodToken::RealTime || token == PeriodToken::Custom {
                continue;
            }
            assert_eq!(resolve(token, None, now()).unwrap().interval, Interval::Daily);
        }
    }

    #[test]
    fn custom_valid_range() {
        let custom = CustomRange {
            start: date(2023, 1, 1),
            end: date(2023, 12, 31),
        };
        let w = resolve(PeriodToken::Custom, Some(custom), now()).unwrap();
        assert_eq!(w.start.date(), date(2023, 1, 1));
        assert_eq!(w.end.date(), date(2023, 12, 31));
    }

    #[test]
    fn custom_end_today_is_allowed() {
        let custom = CustomRange {
            start: date(2024, 6, 1),
            end: date(2024, 6, 15),
        };
        assert!(resolve(PeriodToken::Custom, Some(custom), now()).is_ok());
    }

    #[test]
    fn custom_equal_dates_is_invalid_range() {
        let custom = CustomRange {
            start: date(2024, 3, 1),
            end: date(2024, 3, 1),
        };
        let err = resolve(PeriodToken::Custom, Some(custom), now()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn custom_future_end_is_invalid_range() {
        let custom = CustomRange {
            start: date(2024, 3, 1),
            end: date(2024, 6, 16),
        };
        let err = resolve(PeriodToken::Custom, Some(custom), now()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn custom_without_dates_is_invalid_range() {
        let err = resolve(PeriodToken::Custom, None, now()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn window_display() {
        let w = resolve(PeriodToken::FiveDays, None, now()).unwrap();
        assert_eq!(w.to_string(), "2024-06-10 to 2024-06-15 @ 1d");
    }
}
