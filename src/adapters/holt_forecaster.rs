//! Holt's linear trend (double exponential smoothing) forecaster.
//!
//! Level and trend start from the first two observations:
//!
//! ```text
//! level_t = α·y_t + (1-α)·(level_{t-1} + trend_{t-1})
//! trend_t = β·(level_t - level_{t-1}) + (1-β)·trend_{t-1}
//! ŷ_{T+h} = level_T + h·trend_T
//! ```
//!
//! Bounds are `ŷ ± z·σ·√h`, with σ the sample standard deviation of the
//! in-sample one-step residuals.

use crate::ports::forecast_port::{
    FittedForecast, ForecastFailure, ForecastModelPort, ForecastPoint, TimePoint,
};
use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoltParams {
    pub alpha: f64,
    pub beta: f64,
    pub confidence: f64,
    pub min_observations: usize,
}

impl Default for HoltParams {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.1,
            confidence: 0.95,
            min_observations: 14,
        }
    }
}

/// Two-sided normal quantile for the supported confidence levels.
pub fn z_value(confidence: f64) -> f64 {
    match confidence {
        x if x >= 0.99 => 2.576,
        x if x >= 0.95 => 1.96,
        x if x >= 0.90 => 1.645,
        x if x >= 0.80 => 1.282,
        _ => 1.96,
    }
}

#[derive(Debug, Clone)]
pub struct HoltForecaster {
    params: HoltParams,
}

impl HoltForecaster {
    pub fn new(params: HoltParams) -> Result<Self, ForecastFailure> {
        for (name, value) in [("alpha", params.alpha), ("beta", params.beta)] {
            if !(0.0 < value && value < 1.0) {
                return Err(ForecastFailure::InvalidParameter {
                    name: name.to_string(),
                    reason: "must be between 0 and 1 (exclusive)".to_string(),
                });
            }
        }
        if !(0.0 < params.confidence && params.confidence < 1.0) {
            return Err(ForecastFailure::InvalidParameter {
                name: "confidence".to_string(),
                reason: "must be between 0 and 1 (exclusive)".to_string(),
            });
        }
        Ok(Self {
            params: HoltParams {
                min_observations: params.min_observations.max(3),
                ..params
            },
        })
    }

    pub fn params(&self) -> HoltParams {
        self.params
    }
}

impl ForecastModelPort for HoltForecaster {
    fn fit(&self, history: &[TimePoint]) -> Result<Box<dyn FittedForecast>, ForecastFailure> {
        let required = self.params.min_observations;
        if history.len() < required {
            return Err(ForecastFailure::InsufficientData {
                required,
                actual: history.len(),
            });
        }

        let (alpha, beta) = (self.params.alpha, self.params.beta);
        let mut level = history[0].y;
        let mut trend = history[1].y - history[0].y;
        let mut fitted = Vec::with_capacity(history.len());
        let mut residuals = Vec::with_capacity(history.len() - 1);
        fitted.push(history[0].y);

        for point in &history[1..] {
            let one_step = level + trend;
            fitted.push(one_step);
            residuals.push(point.y - one_step);

            let prev_level = level;
            level = alpha * point.y + (1.0 - alpha) * (level + trend);
            trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        }

        let sigma = sample_std(&residuals);
        if !level.is_finite() || !trend.is_finite() || !sigma.is_finite() {
            return Err(ForecastFailure::Model(
                "smoothing produced non-finite state".to_string(),
            ));
        }

        Ok(Box::new(HoltFit {
            history: history.to_vec(),
            fitted,
            level,
            trend,
            sigma,
            z: z_value(self.params.confidence),
        }))
    }
}

struct HoltFit {
    history: Vec<TimePoint>,
    fitted: Vec<f64>,
    level: f64,
    trend: f64,
    sigma: f64,
    z: f64,
}

impl FittedForecast for HoltFit {
    fn forecast(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastFailure> {
        if horizon > self.history.len() {
            return Err(ForecastFailure::HorizonTooLong {
                horizon,
                observations: self.history.len(),
            });
        }

        let band = self.z * self.sigma;
        let mut out: Vec<ForecastPoint> = self
            .history
            .iter()
            .zip(&self.fitted)
            .map(|(p, &yhat)| ForecastPoint {
                ds: p.ds,
                yhat,
                lower: yhat - band,
                upper: yhat + band,
            })
            .collect();

        let last = self.history[self.history.len() - 1].ds;
        for h in 1..=horizon {
            let yhat = self.level + h as f64 * self.trend;
            let width = band * (h as f64).sqrt();
            out.push(ForecastPoint {
                ds: last + Duration::days(h as i64),
                yhat,
                lower: yhat - width,
                upper: yhat + width,
            });
        }
        Ok(out)
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
