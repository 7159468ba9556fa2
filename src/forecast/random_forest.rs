//! Bagged regression trees over a single time feature.

use crate::forecast::error::ForecastError;
use crate::forecast::{finish, Forecaster, TrainingSet};
use crate::types::forecast::Forecast;
use crate::types::observation::ObservationWindow;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

/// A random forest regressor.
///
/// Each tree is grown on a bootstrap sample of the window by recursively
/// splitting on the time feature where the summed squared error of the two
/// halves is smallest. A node stops splitting once it has fewer than two
/// samples, no variance, or reaches `max_depth`. The forest predicts the mean
/// of its trees.
///
/// Tree-based models cannot extrapolate: the next hour lies to the right of
/// every split, so the forecast is the forest's estimate for the most recent
/// part of the window.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: usize,
    max_depth: Option<usize>,
    seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(DEFAULT_TREES, None, DEFAULT_SEED)
    }
}

impl RandomForest {
    pub fn new(trees: usize, max_depth: Option<usize>, seed: u64) -> Self {
        Self {
            trees: trees.max(1),
            max_depth,
            seed,
        }
    }

    fn grow_forest(&self, x: &[f64], y: &[f64]) -> Vec<Node> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = x.len();
        (0..self.trees)
            .map(|_| {
                let mut sample: Vec<(f64, f64)> = (0..n)
                    .map(|_| {
                        let i = rng.gen_range(0..n);
                        (x[i], y[i])
                    })
                    .collect();
                sample.sort_by(|a, b| a.0.total_cmp(&b.0));
                grow(&sample, 0, self.max_depth)
            })
            .collect()
    }
}

impl Forecaster for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&self, window: &ObservationWindow) -> Result<Forecast, ForecastError> {
        let training = TrainingSet::from_window(window)?;
        let forest = self.grow_forest(&training.x, &training.y);

        let predict = |x: f64| forest.iter().map(|t| t.predict(x)).sum::<f64>() / forest.len() as f64;
        let fitted: Vec<f64> = training.x.iter().map(|&x| predict(x)).collect();
        let prediction = predict(training.target_x());
        debug!(
            "Random forest of {} trees fitted on {} observations",
            forest.len(),
            training.x.len()
        );

        finish(&training, prediction, &fitted, self.name())
    }
}

#[derive(Debug)]
enum Node {
    Leaf(f64),
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: f64) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                threshold,
                left,
                right,
            } => {
                if x <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }
}

/// Grows a tree over `points`, which must be sorted by x.
fn grow(points: &[(f64, f64)], depth: usize, max_depth: Option<usize>) -> Node {
    let n = points.len() as f64;
    let sum: f64 = points.iter().map(|p| p.1).sum();
    let sum_sq: f64 = points.iter().map(|p| p.1 * p.1).sum();
    let mean = sum / n;
    let node_sse = sum_sq - sum * sum / n;

    if points.len() < 2 || node_sse <= 1e-12 || max_depth.is_some_and(|d| depth >= d) {
        return Node::Leaf(mean);
    }

    match best_split(points, sum, sum_sq, node_sse) {
        Some(at) => {
            let threshold = (points[at - 1].0 + points[at].0) / 2.0;
            Node::Split {
                threshold,
                left: Box::new(grow(&points[..at], depth + 1, max_depth)),
                right: Box::new(grow(&points[at..], depth + 1, max_depth)),
            }
        }
        None => Node::Leaf(mean),
    }
}

/// Finds the split index minimizing the summed squared error of both halves.
/// Splits only fall between distinct x values.
fn best_split(points: &[(f64, f64)], sum: f64, sum_sq: f64, node_sse: f64) -> Option<usize> {
    let total = points.len();
    let mut best: Option<(usize, f64)> = None;
    let mut left_sum = 0.0;
    let mut left_sq = 0.0;

    for at in 1..total {
        let y = points[at - 1].1;
        left_sum += y;
        left_sq += y * y;
        if points[at - 1].0 == points[at].0 {
            continue;
        }

        let n_left = at as f64;
        let n_right = (total - at) as f64;
        let right_sum = sum - left_sum;
        let right_sq = sum_sq - left_sq;
        let sse = (left_sq - left_sum * left_sum / n_left)
            + (right_sq - right_sum * right_sum / n_right);

        if best.is_none_or(|(_, b)| sse < b) {
            best = Some((at, sse));
        }
    }

    best.filter(|(_, sse)| *sse < node_sse).map(|(at, _)| at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::observation::Observation;
    use chrono::{DateTime, Duration, FixedOffset};

    fn window(temps: &[f64]) -> ObservationWindow {
        let t0 = DateTime::parse_from_rfc3339("2025-04-25T08:00:00-04:00").unwrap();
        ObservationWindow::new(
            temps
                .iter()
                .enumerate()
                .map(|(i, &t)| Observation::new(t0 + Duration::hours(i as i64), t, 50.0))
                .collect(),
        )
        .unwrap()
    }

    fn hour(h: i64) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-04-25T08:00:00-04:00").unwrap() + Duration::hours(h)
    }

    #[test]
    fn test_target_is_one_hour_after_latest() {
        let forecast = RandomForest::default()
            .fit(&window(&[20.0, 21.0, 22.0]))
            .unwrap();

        assert_eq!(forecast.target, hour(3));
        assert!(forecast.predicted_temperature.is_finite());
        assert!(forecast.fit_score <= 1.0);
        assert_eq!(forecast.model, "random_forest");
    }

    #[test]
    fn test_insufficient_data() {
        let err = RandomForest::default().fit(&window(&[20.0])).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 2,
                actual: 1
            }
        );

        let err = RandomForest::default()
            .fit(&ObservationWindow::default())
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 2,
                actual: 0
            }
        );
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let w = window(&[12.0, 14.5, 13.0, 16.0, 18.5, 17.0, 19.0]);
        let a = RandomForest::new(25, None, 7).fit(&w).unwrap();
        let b = RandomForest::new(25, None, 7).fit(&w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prediction_stays_within_observed_range() {
        let temps = [12.0, 14.5, 13.0, 16.0, 18.5, 17.0, 19.0];
        let forecast = RandomForest::default().fit(&window(&temps)).unwrap();
        assert!(forecast.predicted_temperature >= 12.0);
        assert!(forecast.predicted_temperature <= 19.0);
    }

    #[test]
    fn test_constant_series() {
        let forecast = RandomForest::default()
            .fit(&window(&[15.0, 15.0, 15.0, 15.0]))
            .unwrap();
        assert_eq!(forecast.predicted_temperature, 15.0);
        assert_eq!(forecast.fit_score, 1.0);
    }

    #[test]
    fn test_single_tree_without_bootstrap_duplicates_fits_exactly() {
        // A fully grown tree reproduces any training set with distinct x values.
        let points = vec![(0.0, 3.0), (1.0, 1.0), (2.0, 4.0), (3.0, 1.5)];
        let tree = grow(&points, 0, None);
        for (x, y) in points {
            assert_eq!(tree.predict(x), y);
        }
        assert_eq!(tree.predict(10.0), 1.5);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let points = vec![(0.0, 1.0), (1.0, 2.0), (2.0, 10.0), (3.0, 11.0)];
        let stump = grow(&points, 0, Some(1));
        assert_eq!(stump.predict(0.0), 1.5);
        assert_eq!(stump.predict(3.0), 10.5);

        let leaf = grow(&points, 0, Some(0));
        assert_eq!(leaf.predict(0.0), 6.0);
    }
}
