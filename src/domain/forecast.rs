//! Forecast engine: reshapes a series for a [`ForecastModelPort`] and keeps
//! the future rows of its output.

use crate::domain::error::AnalyticsError;
use crate::domain::ohlcv::OhlcvSeries;
use crate::ports::forecast_port::{ForecastModelPort, TimePoint};
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    pub predicted_close: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Close prices as model history; rows with a non-finite close are skipped.
pub fn to_time_points(series: &OhlcvSeries) -> Vec<TimePoint> {
    series
        .bars()
        .iter()
        .filter(|b| b.close.is_finite())
        .map(|b| TimePoint {
            ds: b.timestamp,
            y: b.close,
        })
        .collect()
}

pub struct ForecastEngine {
    model: Box<dyn ForecastModelPort>,
}

impl ForecastEngine {
    pub fn new(model: Box<dyn ForecastModelPort>) -> Self {
        Self { model }
    }

    /// Forecast `horizon` future closes.
    pub fn forecast(
        &self,
        series: &OhlcvSeries,
        horizon: usize,
    ) -> Result<Vec<ForecastRecord>, AnalyticsError> {
        if horizon == 0 {
            return Err(AnalyticsError::InvalidHorizon { horizon });
        }

        let history = to_time_points(series);
        let unavailable = |reason: String| AnalyticsError::ForecastUnavailable { reason };
        let fitted = self
            .model
            .fit(&history)
            .map_err(|e| unavailable(e.to_string()))?;
        let points = fitted
            .forecast(horizon)
            .map_err(|e| unavailable(e.to_string()))?;

        if points.len() < horizon {
            return Err(unavailable(format!(
                "model returned {} rows for horizon {}",
                points.len(),
                horizon
            )));
        }
        debug!(history = history.len(), horizon, "forecast computed");

        Ok(points[points.len() - horizon..]
            .iter()
            .map(|p| ForecastRecord {
                date: p.ds.date(),
                predicted_close: p.yhat,
                lower_bound: p.lower,
                upper_bound: p.upper,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::ports::forecast_port::{FittedForecast, ForecastFailure, ForecastPoint};
    use chrono::Duration;

    /// Echoes history and extends it with a flat line, `short_by` rows short.
    struct Flat {
        short_by: usize,
    }

    struct FlatFit {
        history: Vec<TimePoint>,
        short_by: usize,
    }

    impl ForecastModelPort for Flat {
        fn fit(&self, history: &[TimePoint]) -> Result<Box<dyn FittedForecast>, ForecastFailure> {
            if history.is_empty() {
                return Err(ForecastFailure::InsufficientData {
                    required: 1,
                    actual: 0,
                });
            }
            Ok(Box::new(FlatFit {
                history: history.to_vec(),
                short_by: self.short_by,
            }))
        }
    }

    impl FittedForecast for FlatFit {
        fn forecast(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastFailure> {
            let last = self.history[self.history.len() - 1];
            let mut out: Vec<ForecastPoint> = self
                .history
                .iter()
                .map(|p| ForecastPoint {
                    ds: p.ds,
                    yhat: p.y,
                    lower: p.y,
                    upper: p.y,
                })
                .collect();
            for h in 1..=horizon.saturating_sub(self.short_by) {
                out.push(ForecastPoint {
                    ds: last.ds + Duration::days(h as i64),
                    yhat: last.y,
                    lower: last.y - 1.0,
                    upper: last.y + 1.0,
                });
            }
            Ok(out)
        }
    }

    fn series(n: usize) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                OhlcvBar::daily(start + Duration::days(i as i64), c, c, c, c, 10)
            })
            .collect();
        OhlcvSeries::from_bars(bars).unwrap()
    }

    #[test]
    fn keeps_only_future_rows() {
        let engine = ForecastEngine::new(Box::new(Flat { short_by: 0 }));
        let out = engine.forecast(&series(10), 3).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(out[2].date, NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());
        assert!(out.iter().all(|r| r.predicted_close == 109.0));
        assert!(out.iter().all(|r| r.lower_bound <= r.predicted_close));
    }

    #[test]
    fn zero_horizon_is_invalid() {
        let engine = ForecastEngine::new(Box::new(Flat { short_by: 0 }));
        assert!(matches!(
            engine.forecast(&series(5), 0),
            Err(AnalyticsError::InvalidHorizon { horizon: 0 })
        ));
    }

    #[test]
    fn short_model_output_is_unavailable() {
        let engine = ForecastEngine::new(Box::new(Flat { short_by: 2 }));
        assert!(matches!(
            engine.forecast(&series(1), 5),
            Err(AnalyticsError::ForecastUnavailable { .. })
        ));
    }

    #[test]
    fn nan_closes_are_not_history() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            OhlcvBar::daily(start, 1.0, 1.0, 1.0, 1.0, 1),
            OhlcvBar::daily(start + Duration::days(1), 1.0, 1.0, 1.0, f64::NAN, 1),
        ];
        let s = OhlcvSeries::from_bars(bars).unwrap();
        assert_eq!(to_time_points(&s).len(), 1);
    }
}
