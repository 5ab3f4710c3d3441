//! Forecasting model port.
//!
//! A model is fitted on `(ds, y)` history and then asked for `horizon` steps.
//! Like the usual time-series libraries, the fitted forecast returns the
//! in-sample rows followed by the future rows; callers slice the tail.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub ds: NaiveDateTime,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastFailure {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("horizon {horizon} exceeds the {observations} observations available")]
    HorizonTooLong { horizon: usize, observations: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("model failure: {0}")]
    Model(String),
}

pub trait ForecastModelPort {
    fn fit(&self, history: &[TimePoint]) -> Result<Box<dyn FittedForecast>, ForecastFailure>;
}

pub trait FittedForecast {
    /// History rows followed by `horizon` future rows.
    fn forecast(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastFailure>;
}
