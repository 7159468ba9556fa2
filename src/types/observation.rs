//! Defines the hourly [`Observation`] record and the [`ObservationWindow`]
//! that the forecasters, writer and renderer operate on.

use chrono::{DateTime, FixedOffset};
use std::ops::Deref;
use thiserror::Error;

/// A single hourly weather reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// The instant of the reading, expressed in the configured zone.
    pub timestamp: DateTime<FixedOffset>,
    /// Air temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Wind speed in metres per second, when the provider reports it.
    pub wind_speed: Option<f64>,
    /// Short description of the conditions, e.g. `Clouds`.
    pub condition: Option<String>,
}

impl Observation {
    pub fn new(timestamp: DateTime<FixedOffset>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            wind_speed: None,
            condition: None,
        }
    }

    pub fn with_wind_speed(mut self, wind_speed: Option<f64>) -> Self {
        self.wind_speed = wind_speed;
        self
    }

    pub fn with_condition(mut self, condition: Option<String>) -> Self {
        self.condition = condition;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("Observation at index {index} ({timestamp}) is not strictly after its predecessor")]
    NotStrictlyIncreasing {
        index: usize,
        timestamp: DateTime<FixedOffset>,
    },
}

/// A chronologically ascending run of observations.
///
/// Timestamps are strictly increasing, so no two observations in a window share
/// an instant. The window dereferences to a slice of [`Observation`].
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, Duration};
/// use weathercast::{Observation, ObservationWindow};
///
/// let t0 = DateTime::parse_from_rfc3339("2025-04-25T10:00:00+00:00").unwrap();
/// let window = ObservationWindow::new(vec![
///     Observation::new(t0, 20.0, 50.0),
///     Observation::new(t0 + Duration::hours(1), 21.0, 52.0),
/// ])
/// .unwrap();
///
/// assert_eq!(window.len(), 2);
/// assert_eq!(window.latest().unwrap().temperature, 21.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationWindow {
    observations: Vec<Observation>,
    city: Option<String>,
}

impl ObservationWindow {
    /// Creates a window, rejecting any sequence that is not strictly increasing in time.
    pub fn new(observations: Vec<Observation>) -> Result<Self, WindowError> {
        for (index, pair) in observations.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(WindowError::NotStrictlyIncreasing {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self {
            observations,
            city: None,
        })
    }

    /// Sorts the readings by time and drops duplicate instants (the last reading wins),
    /// keeping only the `capacity` most recent ones.
    pub fn from_unordered(mut observations: Vec<Observation>, capacity: usize) -> Self {
        observations.sort_by_key(|o| o.timestamp);
        let mut deduped: Vec<Observation> = Vec::with_capacity(observations.len());
        for observation in observations {
            match deduped.last_mut() {
                Some(last) if last.timestamp == observation.timestamp => *last = observation,
                _ => deduped.push(observation),
            }
        }
        let skip = deduped.len().saturating_sub(capacity);
        Self {
            observations: deduped.split_off(skip),
            city: None,
        }
    }

    /// Attaches the place name the observations were taken at.
    pub fn with_city(mut self, city: Option<String>) -> Self {
        self.city = city;
        self
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    /// The most recent observation in the window.
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }

    pub fn into_inner(self) -> Vec<Observation> {
        self.observations
    }
}

impl Deref for ObservationWindow {
    type Target = [Observation];

    fn deref(&self) -> &Self::Target {
        &self.observations
    }
}

impl<'a> IntoIterator for &'a ObservationWindow {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}
