//! Serialization of observation windows and forecasts into flat-file artifacts,
//! and parsing of those artifacts back into typed values.
//!
//! Observation files carry the columns `timestamp`, `temperature`, `humidity`,
//! and the optional `wind_speed_mps`, `weather_description` and `city`;
//! forecast files carry `forecast_timestamp`, `predicted_temperature`,
//! `fit_score` and `model`. Timestamps are RFC 3339 strings in the configured
//! zone. CSV files have a header row; JSON files are an array of row objects.

pub mod error;

use crate::types::artifact::{artifact_file_name, Artifact, ArtifactKind, DataFormat};
use crate::types::forecast::Forecast;
use crate::types::observation::{Observation, ObservationWindow};
use crate::utils::parse_timestamp;
use crate::writer::error::WriteError;
use chrono::{DateTime, FixedOffset, Utc};
use polars::prelude::*;
use std::io::Cursor;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_TEMPERATURE: &str = "temperature";
pub const COL_HUMIDITY: &str = "humidity";
pub const COL_WIND_SPEED: &str = "wind_speed_mps";
pub const COL_CONDITION: &str = "weather_description";
pub const COL_CITY: &str = "city";
pub const COL_FORECAST_TIMESTAMP: &str = "forecast_timestamp";
pub const COL_PREDICTED_TEMPERATURE: &str = "predicted_temperature";
pub const COL_FIT_SCORE: &str = "fit_score";
pub const COL_MODEL: &str = "model";

/// Turns a run's results into artifacts in the configured format and zone.
#[derive(Debug, Clone, Copy)]
pub struct ResultWriter {
    format: DataFormat,
    zone: FixedOffset,
}

impl ResultWriter {
    pub fn new(format: DataFormat, zone: FixedOffset) -> Self {
        Self { format, zone }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Produces the observation-window artifact and the forecast artifact for a run.
    pub fn write(
        &self,
        window: &ObservationWindow,
        forecast: &Forecast,
        run_time: DateTime<Utc>,
    ) -> Result<(Artifact, Artifact), WriteError> {
        Ok((
            self.observations_artifact(window, run_time)?,
            self.forecast_artifact(forecast, run_time)?,
        ))
    }

    pub fn observations_artifact(
        &self,
        window: &ObservationWindow,
        run_time: DateTime<Utc>,
    ) -> Result<Artifact, WriteError> {
        for observation in window {
            ensure_finite("temperature", observation.temperature)?;
            ensure_finite("humidity", observation.humidity)?;
            if let Some(wind_speed) = observation.wind_speed {
                ensure_finite("wind_speed", wind_speed)?;
            }
        }

        let name = artifact_file_name(ArtifactKind::Observations, run_time, self.format.extension());
        let timestamps: Vec<String> = window
            .iter()
            .map(|o| o.timestamp.with_timezone(&self.zone).to_rfc3339())
            .collect();
        let temperatures: Vec<f64> = window.iter().map(|o| o.temperature).collect();
        let humidities: Vec<f64> = window.iter().map(|o| o.humidity).collect();
        let wind_speeds: Vec<Option<f64>> = window.iter().map(|o| o.wind_speed).collect();
        let conditions: Vec<Option<String>> =
            window.iter().map(|o| o.condition.clone()).collect();
        let city = window.city().map(str::to_string);
        let cities: Vec<Option<String>> = window.iter().map(|_| city.clone()).collect();

        let df = df!(
            COL_TIMESTAMP => timestamps,
            COL_TEMPERATURE => temperatures,
            COL_HUMIDITY => humidities,
            COL_WIND_SPEED => wind_speeds,
            COL_CONDITION => conditions,
            COL_CITY => cities
        )
        .map_err(|e| WriteError::Serialization {
            name: name.clone(),
            source: e,
        })?;

        let bytes = encode(df, self.format, &name)?;
        Ok(Artifact::new(ArtifactKind::Observations, name, bytes))
    }

    pub fn forecast_artifact(
        &self,
        forecast: &Forecast,
        run_time: DateTime<Utc>,
    ) -> Result<Artifact, WriteError> {
        ensure_finite("predicted_temperature", forecast.predicted_temperature)?;
        ensure_finite("fit_score", forecast.fit_score)?;

        let name = artifact_file_name(ArtifactKind::Forecast, run_time, self.format.extension());
        let df = df!(
            COL_FORECAST_TIMESTAMP => [forecast.target.with_timezone(&self.zone).to_rfc3339()],
            COL_PREDICTED_TEMPERATURE => [forecast.predicted_temperature],
            COL_FIT_SCORE => [forecast.fit_score],
            COL_MODEL => [forecast.model.clone()]
        )
        .map_err(|e| WriteError::Serialization {
            name: name.clone(),
            source: e,
        })?;

        let bytes = encode(df, self.format, &name)?;
        Ok(Artifact::new(ArtifactKind::Forecast, name, bytes))
    }
}

fn ensure_finite(field: &'static str, value: f64) -> Result<(), WriteError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WriteError::NonFinite { field, value })
    }
}

fn encode(mut df: DataFrame, format: DataFormat, name: &str) -> Result<Vec<u8>, WriteError> {
    let mut buffer = Vec::new();
    match format {
        DataFormat::Csv => CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df),
        DataFormat::Json => JsonWriter::new(&mut buffer)
            .with_json_format(JsonFormat::Json)
            .finish(&mut df),
    }
    .map_err(|e| WriteError::Serialization {
        name: name.to_string(),
        source: e,
    })?;
    Ok(buffer)
}

fn decode(name: &str, bytes: &[u8]) -> Result<DataFrame, WriteError> {
    let format =
        DataFormat::from_file_name(name).ok_or_else(|| WriteError::UnknownFormat(name.to_string()))?;
    let cursor = Cursor::new(bytes.to_vec());
    match format {
        DataFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(cursor)
            .finish(),
        DataFormat::Json => JsonReader::new(cursor).finish(),
    }
    .map_err(|e| WriteError::Parse {
        name: name.to_string(),
        source: e,
    })
}

fn float_column(df: &DataFrame, name: &str, column: &str) -> Result<Vec<f64>, WriteError> {
    let series = df.column(column).map_err(|_| WriteError::MissingColumn {
        name: name.to_string(),
        column: column.to_string(),
    })?;
    let parse_err = |e| WriteError::Parse {
        name: name.to_string(),
        source: e,
    };
    let series = series.cast(&DataType::Float64).map_err(parse_err)?;
    series
        .f64()
        .map_err(parse_err)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| WriteError::MissingValue {
                name: name.to_string(),
                column: column.to_string(),
                row,
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str, column: &str) -> Result<Vec<String>, WriteError> {
    let series = df.column(column).map_err(|_| WriteError::MissingColumn {
        name: name.to_string(),
        column: column.to_string(),
    })?;
    series
        .str()
        .map_err(|e| WriteError::Parse {
            name: name.to_string(),
            source: e,
        })?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.map(str::to_string).ok_or_else(|| WriteError::MissingValue {
                name: name.to_string(),
                column: column.to_string(),
                row,
            })
        })
        .collect()
}

/// Reads a column that older or foreign artifacts may lack; absent columns and
/// null cells read as `None`.
fn optional_float_column(
    df: &DataFrame,
    name: &str,
    column: &str,
) -> Result<Vec<Option<f64>>, WriteError> {
    let Ok(series) = df.column(column) else {
        return Ok(vec![None; df.height()]);
    };
    let parse_err = |e| WriteError::Parse {
        name: name.to_string(),
        source: e,
    };
    let series = series.cast(&DataType::Float64).map_err(parse_err)?;
    Ok(series.f64().map_err(parse_err)?.into_iter().collect())
}

fn optional_string_column(
    df: &DataFrame,
    name: &str,
    column: &str,
) -> Result<Vec<Option<String>>, WriteError> {
    let Ok(series) = df.column(column) else {
        return Ok(vec![None; df.height()]);
    };
    let parse_err = |e| WriteError::Parse {
        name: name.to_string(),
        source: e,
    };
    // All-null JSON columns decode with the null dtype.
    let series = series.cast(&DataType::String).map_err(parse_err)?;
    Ok(series
        .str()
        .map_err(parse_err)?
        .into_iter()
        .map(|value| value.map(str::to_string).filter(|v| !v.is_empty()))
        .collect())
}

fn timestamp_column(
    df: &DataFrame,
    name: &str,
    column: &str,
    zone: FixedOffset,
) -> Result<Vec<DateTime<FixedOffset>>, WriteError> {
    string_column(df, name, column)?
        .into_iter()
        .map(|value| {
            parse_timestamp(&value, zone).ok_or_else(|| WriteError::InvalidTimestamp {
                name: name.to_string(),
                value,
            })
        })
        .collect()
}

/// Parses an observation-window artifact. Timestamps without an offset are taken
/// to be in `zone`.
pub fn parse_observations(
    name: &str,
    bytes: &[u8],
    zone: FixedOffset,
) -> Result<ObservationWindow, WriteError> {
    let df = decode(name, bytes)?;
    let timestamps = timestamp_column(&df, name, COL_TIMESTAMP, zone)?;
    let temperatures = float_column(&df, name, COL_TEMPERATURE)?;
    let humidities = float_column(&df, name, COL_HUMIDITY)?;
    let wind_speeds = optional_float_column(&df, name, COL_WIND_SPEED)?;
    let conditions = optional_string_column(&df, name, COL_CONDITION)?;
    let city = optional_string_column(&df, name, COL_CITY)?
        .into_iter()
        .flatten()
        .next();

    let observations = timestamps
        .into_iter()
        .zip(temperatures)
        .zip(humidities)
        .zip(wind_speeds)
        .zip(conditions)
        .map(|((((timestamp, temperature), humidity), wind_speed), condition)| {
            Observation::new(timestamp, temperature, humidity)
                .with_wind_speed(wind_speed)
                .with_condition(condition)
        })
        .collect();
    ObservationWindow::new(observations)
        .map(|window| window.with_city(city))
        .map_err(|e| WriteError::Window {
            name: name.to_string(),
            source: e,
        })
}

/// Parses a forecast artifact into its forecast rows. Timestamps without an
/// offset are taken to be in `zone`; a missing `model` column reads as `unknown`.
pub fn parse_forecasts(
    name: &str,
    bytes: &[u8],
    zone: FixedOffset,
) -> Result<Vec<Forecast>, WriteError> {
    let df = decode(name, bytes)?;
    let targets = timestamp_column(&df, name, COL_FORECAST_TIMESTAMP, zone)?;
    let predictions = float_column(&df, name, COL_PREDICTED_TEMPERATURE)?;
    let scores = float_column(&df, name, COL_FIT_SCORE)?;
    let models = if df.column(COL_MODEL).is_ok() {
        string_column(&df, name, COL_MODEL)?
    } else {
        vec!["unknown".to_string(); df.height()]
    };

    Ok(targets
        .into_iter()
        .zip(predictions)
        .zip(scores)
        .zip(models)
        .map(|(((target, predicted_temperature), fit_score), model)| Forecast {
            target,
            predicted_temperature,
            fit_score,
            model,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn zone() -> FixedOffset {
        FixedOffset::west_opt(4 * 3600).unwrap()
    }

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 25, 14, 0, 5).unwrap()
    }

    fn sample_window() -> ObservationWindow {
        let t0 = DateTime::parse_from_rfc3339("2025-04-25T07:00:00-04:00").unwrap();
        ObservationWindow::new(vec![
            Observation::new(t0, 20.0, 50.0)
                .with_wind_speed(Some(4.1))
                .with_condition(Some("Clouds".to_string())),
            Observation::new(t0 + Duration::hours(1), 21.25, 52.0),
            Observation::new(t0 + Duration::hours(2), -3.5, 49.5).with_wind_speed(Some(0.0)),
        ])
        .unwrap()
        .with_city(Some("Mount Pleasant".to_string()))
    }

    fn sample_forecast() -> Forecast {
        Forecast {
            target: DateTime::parse_from_rfc3339("2025-04-25T10:00:00-04:00").unwrap(),
            predicted_temperature: 21.7,
            fit_score: 0.42,
            model: "random_forest".to_string(),
        }
    }

    fn assert_same_window(a: &ObservationWindow, b: &ObservationWindow) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.timestamp, y.timestamp);
            assert!((x.temperature - y.temperature).abs() < 1e-9);
            assert!((x.humidity - y.humidity).abs() < 1e-9);
            match (x.wind_speed, y.wind_speed) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9),
                (a, b) => assert_eq!(a, b),
            }
            assert_eq!(x.condition, y.condition);
        }
        assert_eq!(a.city(), b.city());
    }

    #[test]
    fn test_csv_observations_round_trip() {
        let writer = ResultWriter::new(DataFormat::Csv, zone());
        let artifact = writer
            .observations_artifact(&sample_window(), run_time())
            .unwrap();

        assert_eq!(artifact.name, "weather_20250425140005.csv");
        let text = String::from_utf8(artifact.bytes.clone()).unwrap();
        assert!(text.starts_with(
            "timestamp,temperature,humidity,wind_speed_mps,weather_description,city"
        ));

        let parsed = parse_observations(&artifact.name, &artifact.bytes, zone()).unwrap();
        assert_same_window(&parsed, &sample_window());
    }

    #[test]
    fn test_json_observations_round_trip() {
        let writer = ResultWriter::new(DataFormat::Json, zone());
        let artifact = writer
            .observations_artifact(&sample_window(), run_time())
            .unwrap();

        assert_eq!(artifact.name, "weather_20250425140005.json");
        let parsed = parse_observations(&artifact.name, &artifact.bytes, zone()).unwrap();
        assert_same_window(&parsed, &sample_window());
    }

    #[test]
    fn test_forecast_round_trip() {
        for format in [DataFormat::Csv, DataFormat::Json] {
            let writer = ResultWriter::new(format, zone());
            let artifact = writer.forecast_artifact(&sample_forecast(), run_time()).unwrap();
            assert_eq!(
                artifact.name,
                format!("forecast_20250425140005.{}", format.extension())
            );

            let parsed = parse_forecasts(&artifact.name, &artifact.bytes, zone()).unwrap();
            assert_eq!(parsed, vec![sample_forecast()]);
        }
    }

    #[test]
    fn test_write_produces_two_artifacts() {
        let writer = ResultWriter::new(DataFormat::Csv, zone());
        let (observations, forecast) = writer
            .write(&sample_window(), &sample_forecast(), run_time())
            .unwrap();
        assert_eq!(observations.kind, ArtifactKind::Observations);
        assert_eq!(forecast.kind, ArtifactKind::Forecast);
    }

    #[test]
    fn test_non_finite_values_fail_serialization() {
        let writer = ResultWriter::new(DataFormat::Csv, zone());
        let t0 = DateTime::parse_from_rfc3339("2025-04-25T07:00:00-04:00").unwrap();
        let window = ObservationWindow::new(vec![Observation::new(t0, f64::NAN, 50.0)]).unwrap();

        let err = writer.observations_artifact(&window, run_time()).unwrap_err();
        assert!(err.is_serialization());

        let mut forecast = sample_forecast();
        forecast.predicted_temperature = f64::INFINITY;
        let err = writer.forecast_artifact(&forecast, run_time()).unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_parse_forecasts_assumes_zone_for_naive_timestamps() {
        let csv = "forecast_timestamp,predicted_temperature,fit_score\n2025-04-25 10:00:00,18.5,0.9\n";
        let parsed = parse_forecasts("forecast_1.csv", csv.as_bytes(), zone()).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].target.to_rfc3339(), "2025-04-25T10:00:00-04:00");
        assert_eq!(parsed[0].predicted_temperature, 18.5);
        assert_eq!(parsed[0].model, "unknown");
    }

    #[test]
    fn test_parse_forecasts_missing_column() {
        let csv = "forecast_timestamp,fit_score\n2025-04-25 10:00:00,0.9\n";
        let err = parse_forecasts("forecast_1.csv", csv.as_bytes(), zone()).unwrap_err();
        assert!(matches!(err, WriteError::MissingColumn { column, .. } if column == "predicted_temperature"));
    }

    #[test]
    fn test_parse_rejects_unknown_extension() {
        let err = parse_forecasts("forecast_1.parquet", b"", zone()).unwrap_err();
        assert!(matches!(err, WriteError::UnknownFormat(_)));
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let csv = "forecast_timestamp,predicted_temperature,fit_score\nsoon,18.5,0.9\n";
        let err = parse_forecasts("forecast_1.csv", csv.as_bytes(), zone()).unwrap_err();
        assert!(matches!(err, WriteError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_parse_observations_without_optional_columns() {
        let csv = "timestamp,temperature,humidity\n2025-04-25 07:00:00,20.0,50\n2025-04-25 08:00:00,21.0,52\n";
        let window = parse_observations("weather_1.csv", csv.as_bytes(), zone()).unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window.city(), None);
        assert!(window.iter().all(|o| o.wind_speed.is_none() && o.condition.is_none()));
    }

    #[test]
    fn test_json_observations_without_wind_or_city() {
        let writer = ResultWriter::new(DataFormat::Json, zone());
        let t0 = DateTime::parse_from_rfc3339("2025-04-25T07:00:00-04:00").unwrap();
        let window = ObservationWindow::new(vec![
            Observation::new(t0, 20.0, 50.0),
            Observation::new(t0 + Duration::hours(1), 21.0, 52.0),
        ])
        .unwrap();

        let artifact = writer.observations_artifact(&window, run_time()).unwrap();
        let parsed = parse_observations(&artifact.name, &artifact.bytes, zone()).unwrap();
        assert_same_window(&parsed, &window);
    }

    #[test]
    fn test_non_finite_wind_speed_fails_serialization() {
        let writer = ResultWriter::new(DataFormat::Csv, zone());
        let t0 = DateTime::parse_from_rfc3339("2025-04-25T07:00:00-04:00").unwrap();
        let window = ObservationWindow::new(vec![
            Observation::new(t0, 20.0, 50.0).with_wind_speed(Some(f64::NAN))
        ])
        .unwrap();

        let err = writer.observations_artifact(&window, run_time()).unwrap_err();
        assert!(matches!(err, WriteError::NonFinite { field: "wind_speed", .. }));
    }
}
