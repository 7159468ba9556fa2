//! Client for a WeatherAPI-style provider.
//!
//! Hourly history comes from `history.json`, queried once per calendar day
//! covered by the requested window, which answers with
//! `{"location": {"name"}, "forecast": {"forecastday": [{"hour": [{"time_epoch", "temp_c", "humidity", "wind_kph", "condition": {"text"}}]}]}}`.
//! The latest reading can optionally be topped up from `current.json`, which
//! answers with `{"location": {"name"}, "current": {"last_updated_epoch", "temp_c", ...}}`.

use crate::fetcher::error::FetchError;
use crate::fetcher::{ObservationSource, MAX_WINDOW_HOURS};
use crate::types::observation::{Observation, ObservationWindow};
use chrono::serde::ts_seconds;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "http://api.weatherapi.com/v1/history.json";
pub const DEFAULT_CURRENT_ENDPOINT: &str = "http://api.weatherapi.com/v1/current.json";

#[derive(Deserialize)]
struct ProviderLocation {
    name: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    location: Option<ProviderLocation>,
    forecast: ForecastBlock,
}

#[derive(Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    location: Option<ProviderLocation>,
    current: HourRecord,
}

#[derive(Deserialize)]
struct ForecastBlock {
    forecastday: Vec<ForecastDay>,
}

#[derive(Deserialize)]
struct ForecastDay {
    hour: Vec<HourRecord>,
}

#[derive(Deserialize)]
struct Condition {
    text: String,
}

#[derive(Deserialize)]
struct HourRecord {
    #[serde(with = "ts_seconds", alias = "last_updated_epoch")]
    time_epoch: DateTime<Utc>,
    temp_c: f64,
    humidity: f64,
    #[serde(default)]
    wind_kph: Option<f64>,
    #[serde(default)]
    condition: Option<Condition>,
}

impl HourRecord {
    fn into_observation(self, zone: FixedOffset) -> Observation {
        Observation::new(self.time_epoch.with_timezone(&zone), self.temp_c, self.humidity)
            .with_wind_speed(self.wind_kph.map(|kph| kph / 3.6))
            .with_condition(self.condition.map(|c| c.text))
    }
}

fn city_of(location: Option<ProviderLocation>) -> Option<String> {
    location.and_then(|l| l.name).filter(|name| !name.trim().is_empty())
}

/// Readings decoded from one provider response.
#[derive(Debug)]
struct Readings {
    city: Option<String>,
    observations: Vec<Observation>,
}

/// The provider's latest reading for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Place name as resolved by the provider.
    pub city: Option<String>,
    pub observation: Observation,
}

pub struct WeatherApiFetcher {
    client: Client,
    endpoint: String,
    current_endpoint: String,
    include_current: bool,
    api_key: String,
    zone: FixedOffset,
}

impl WeatherApiFetcher {
    /// Creates a fetcher for `endpoint` using `api_key` as the credential.
    ///
    /// Observation timestamps are expressed in `zone`, which also decides which
    /// calendar days are requested. `timeout` bounds every request.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        zone: FixedOffset,
        timeout: std::time::Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            current_endpoint: DEFAULT_CURRENT_ENDPOINT.to_string(),
            include_current: false,
            api_key: api_key.to_string(),
            zone,
        })
    }

    /// Also requests current conditions from `endpoint` on every fetch, so the
    /// window ends with the provider's latest reading.
    pub fn with_current(mut self, endpoint: &str) -> Self {
        self.current_endpoint = endpoint.to_string();
        self.include_current = true;
        self
    }

    /// Sends one GET request and decodes the JSON body.
    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        // The credential stays out of anything that gets logged.
        let params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let description = format!("{} ({})", endpoint, params.join(", "));
        let request = self
            .client
            .get(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .build()
            .map_err(|e| FetchError::InvalidEndpoint(endpoint.to_string(), e))?;

        debug!("Requesting {}", description);
        let response = self
            .client
            .execute(request)
            .map_err(|e| FetchError::Upstream(description.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", description, e.status());
                return Err(if let Some(status) = e.status() {
                    FetchError::UpstreamStatus {
                        url: description,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::Upstream(description, e)
                });
            }
        };

        let body = response
            .text()
            .map_err(|e| FetchError::Upstream(description.clone(), e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::DataShape {
            url: description,
            source: e,
        })
    }

    /// Fetches the hourly records for one calendar day.
    fn fetch_day(&self, location: &str, date: NaiveDate) -> Result<Readings, FetchError> {
        let dt = date.format("%Y-%m-%d").to_string();
        let history: HistoryResponse =
            self.get(&self.endpoint, &[("q", location), ("dt", dt.as_str())])?;
        Ok(history_readings(history, self.zone))
    }

    /// Fetches the provider's current conditions for `location`.
    pub fn fetch_current(&self, location: &str) -> Result<CurrentConditions, FetchError> {
        let current: CurrentResponse = self.get(&self.current_endpoint, &[("q", location)])?;
        Ok(CurrentConditions {
            city: city_of(current.location),
            observation: current.current.into_observation(self.zone),
        })
    }
}

impl ObservationSource for WeatherApiFetcher {
    fn fetch(
        &self,
        location: &str,
        window_hours: usize,
        now: DateTime<Utc>,
    ) -> Result<ObservationWindow, FetchError> {
        if window_hours == 0 || window_hours > MAX_WINDOW_HOURS {
            return Err(FetchError::WindowOutOfRange(window_hours));
        }

        let mut city = None;
        let mut readings = Vec::new();
        for date in days_covering(now, window_hours, self.zone)? {
            let day = self.fetch_day(location, date)?;
            city = city.or(day.city);
            readings.extend(day.observations);
        }
        if self.include_current {
            let current = self.fetch_current(location)?;
            city = city.or(current.city);
            readings.push(current.observation);
        }

        let cutoff = now.with_timezone(&self.zone);
        readings.retain(|o| o.timestamp <= cutoff);
        let window =
            ObservationWindow::from_unordered(readings, window_hours + 1).with_city(city);
        info!(
            "Fetched {} hourly observations for {}",
            window.len(),
            window.city().unwrap_or(location)
        );
        Ok(window)
    }
}

/// Calendar days in `zone` touched by the `window_hours + 1` hours ending at `now`.
fn days_covering(
    now: DateTime<Utc>,
    window_hours: usize,
    zone: FixedOffset,
) -> Result<Vec<NaiveDate>, FetchError> {
    let span = i64::try_from(window_hours)
        .ok()
        .and_then(|h| h.checked_add(1))
        .and_then(TimeDelta::try_hours)
        .ok_or(FetchError::WindowOutOfRange(window_hours))?;
    let start = now
        .checked_sub_signed(span)
        .ok_or(FetchError::WindowOutOfRange(window_hours))?
        .with_timezone(&zone)
        .date_naive();
    let end = now.with_timezone(&zone).date_naive();
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

fn history_readings(history: HistoryResponse, zone: FixedOffset) -> Readings {
    Readings {
        city: city_of(history.location),
        observations: history
            .forecast
            .forecastday
            .into_iter()
            .flat_map(|day| day.hour)
            .map(|hour| hour.into_observation(zone))
            .collect(),
    }
}
