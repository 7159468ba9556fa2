use chrono::{DateTime, FixedOffset};

/// A one-step-ahead temperature prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// The hour being predicted, one hour past the last observation used for fitting.
    pub target: DateTime<FixedOffset>,
    /// Predicted air temperature in degrees Celsius.
    pub predicted_temperature: f64,
    /// In-sample coefficient of determination, in `(-inf, 1]`.
    pub fit_score: f64,
    /// Name of the estimator that produced the forecast.
    pub model: String,
}
