//! Ordinary least squares trend line over time.

use crate::forecast::error::ForecastError;
use crate::forecast::{finish, Forecaster, TrainingSet};
use crate::types::forecast::Forecast;
use crate::types::observation::ObservationWindow;

/// Fits `temperature = intercept + slope * t`, with `t` in hours since the first
/// observation, and extrapolates the line one hour ahead.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrend;

impl Forecaster for LinearTrend {
    fn name(&self) -> &'static str {
        "linear_trend"
    }

    fn fit(&self, window: &ObservationWindow) -> Result<Forecast, ForecastError> {
        let training = TrainingSet::from_window(window)?;
        let origin = training.x[0];
        let t: Vec<f64> = training.x.iter().map(|x| (x - origin) / 3600.0).collect();
        let y = &training.y;

        let n = t.len() as f64;
        let sum_t: f64 = t.iter().sum();
        let sum_y: f64 = y.iter().sum();
        let sum_t2: f64 = t.iter().map(|v| v * v).sum();
        let sum_ty: f64 = t.iter().zip(y).map(|(a, b)| a * b).sum();

        // Timestamps are strictly increasing, so the denominator is positive.
        let slope = (n * sum_ty - sum_t * sum_y) / (n * sum_t2 - sum_t * sum_t);
        let intercept = (sum_y - slope * sum_t) / n;

        let fitted: Vec<f64> = t.iter().map(|v| intercept + slope * v).collect();
        let target_t = (training.target_x() - origin) / 3600.0;

        finish(&training, intercept + slope * target_t, &fitted, self.name())
    }
}
