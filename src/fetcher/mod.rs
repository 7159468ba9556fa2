//! Retrieval of recent hourly observations from a weather provider.

pub mod error;
pub mod weather_api;

use crate::fetcher::error::FetchError;
use crate::types::observation::ObservationWindow;
use chrono::{DateTime, Utc};

/// Largest supported window, one week of hourly readings.
pub const MAX_WINDOW_HOURS: usize = 168;

/// A provider of recent hourly observations.
///
/// Implementations perform no retries; any failure is surfaced to the caller.
pub trait ObservationSource {
    /// Returns up to `window_hours + 1` most recent hourly observations taken at
    /// or before `now` for `location`, oldest first.
    fn fetch(
        &self,
        location: &str,
        window_hours: usize,
        now: DateTime<Utc>,
    ) -> Result<ObservationWindow, FetchError>;
}
