//! Next-hour temperature forecasting.
//!
//! A [`Forecaster`] fits a regression of temperature on time over an
//! [`ObservationWindow`] and projects it one hour past the latest observation.
//! Time is fed to the estimators as seconds since the Unix epoch, which is
//! monotonic in the window order.

pub mod error;
pub mod linear_trend;
pub mod random_forest;

use crate::forecast::error::ForecastError;
use crate::types::forecast::Forecast;
use crate::types::observation::ObservationWindow;
use chrono::{DateTime, Duration, FixedOffset};
use serde::Deserialize;

pub const MIN_OBSERVATIONS: usize = 2;

/// An estimator that turns an observation window into a one-step-ahead forecast.
pub trait Forecaster {
    /// Short identifier recorded alongside each forecast.
    fn name(&self) -> &'static str;

    /// Fits the window and forecasts the temperature one hour after its latest observation.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InsufficientData`] for windows with fewer than two observations.
    fn fit(&self, window: &ObservationWindow) -> Result<Forecast, ForecastError>;
}

/// Which estimator the pipeline uses, as selected in the configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ForecastModel {
    RandomForest {
        #[serde(default = "default_trees")]
        trees: usize,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    LinearTrend,
}

fn default_trees() -> usize {
    random_forest::DEFAULT_TREES
}

fn default_seed() -> u64 {
    random_forest::DEFAULT_SEED
}

impl Default for ForecastModel {
    fn default() -> Self {
        ForecastModel::RandomForest {
            trees: default_trees(),
            max_depth: None,
            seed: default_seed(),
        }
    }
}

impl ForecastModel {
    pub fn build(&self) -> Box<dyn Forecaster> {
        match self {
            ForecastModel::RandomForest {
                trees,
                max_depth,
                seed,
            } => Box::new(random_forest::RandomForest::new(*trees, *max_depth, *seed)),
            ForecastModel::LinearTrend => Box::new(linear_trend::LinearTrend),
        }
    }
}

/// Training data extracted from a window: epoch seconds and temperatures.
pub(crate) struct TrainingSet {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub latest: DateTime<FixedOffset>,
}

impl TrainingSet {
    pub(crate) fn from_window(window: &ObservationWindow) -> Result<Self, ForecastError> {
        let latest = match window.latest() {
            Some(latest) if window.len() >= MIN_OBSERVATIONS => latest.timestamp,
            _ => {
                return Err(ForecastError::InsufficientData {
                    required: MIN_OBSERVATIONS,
                    actual: window.len(),
                })
            }
        };
        Ok(Self {
            x: window.iter().map(|o| o.timestamp.timestamp() as f64).collect(),
            y: window.iter().map(|o| o.temperature).collect(),
            latest,
        })
    }

    pub(crate) fn target(&self) -> DateTime<FixedOffset> {
        self.latest + Duration::hours(1)
    }

    pub(crate) fn target_x(&self) -> f64 {
        self.target().timestamp() as f64
    }
}

/// Coefficient of determination of `predicted` against `actual`.
///
/// When `actual` has no variance the score is 1.0 for a perfect fit and 0.0
/// otherwise, so the result is always finite.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;

    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot < 1e-12 {
        return if ss_res < 1e-12 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

pub(crate) fn finish(
    training: &TrainingSet,
    prediction: f64,
    fitted: &[f64],
    model: &str,
) -> Result<Forecast, ForecastError> {
    if !prediction.is_finite() {
        return Err(ForecastError::NonFinitePrediction(prediction));
    }
    Ok(Forecast {
        target: training.target(),
        predicted_temperature: prediction,
        fit_score: r_squared(&training.y, fitted),
        model: model.to_string(),
    })
}
