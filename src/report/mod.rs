//! Builds the combined chart of the current observation window and every
//! forecast archived so far.

pub mod error;

use crate::report::error::RenderError;
use crate::types::artifact::{artifact_file_name, Artifact, ArtifactKind};
use crate::types::forecast::Forecast;
use crate::types::observation::ObservationWindow;
use crate::utils::ensure_dir_exists;
use chrono::{DateTime, FixedOffset, Utc};
use log::info;
use plotlars::{Legend, Line, Plot, Rgb, Shape, Text, TimeSeriesPlot};
use polars::prelude::*;
use std::path::Path;

/// One point on the shared time axis. Observation rows carry temperature and
/// humidity; forecast rows carry only the predicted temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub time: DateTime<FixedOffset>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub forecast: Option<f64>,
}

/// Everything a chart shows, in drawing order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartData {
    pub rows: Vec<ChartRow>,
}

impl ChartData {
    pub fn observation_points(&self) -> usize {
        self.rows.iter().filter(|r| r.temperature.is_some()).count()
    }

    pub fn forecast_points(&self) -> usize {
        self.rows.iter().filter(|r| r.forecast.is_some()).count()
    }
}

pub struct ReportRenderer {
    zone: FixedOffset,
    title: String,
}

impl ReportRenderer {
    pub fn new(zone: FixedOffset, title: impl Into<String>) -> Self {
        Self {
            zone,
            title: title.into(),
        }
    }

    /// Overlays the window's temperature and humidity with all known forecast points.
    ///
    /// The result depends only on the window and the set of forecasts, not on the
    /// order the forecasts were listed in.
    pub fn compose(
        &self,
        window: &ObservationWindow,
        forecasts: &[Forecast],
    ) -> Result<ChartData, RenderError> {
        if window.is_empty() {
            return Err(RenderError::EmptyWindow);
        }

        let mut predicted: Vec<(DateTime<FixedOffset>, f64)> = forecasts
            .iter()
            .map(|f| (f.target.with_timezone(&self.zone), f.predicted_temperature))
            .collect();
        predicted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut rows: Vec<ChartRow> = window
            .iter()
            .map(|o| ChartRow {
                time: o.timestamp.with_timezone(&self.zone),
                temperature: Some(o.temperature),
                humidity: Some(o.humidity),
                forecast: None,
            })
            .chain(predicted.into_iter().map(|(time, value)| ChartRow {
                time,
                temperature: None,
                humidity: None,
                forecast: Some(value),
            }))
            .collect();
        // Stable, so observations stay ahead of forecasts for the same hour.
        rows.sort_by_key(|r| r.time);

        Ok(ChartData { rows })
    }

    /// Draws `data` as an HTML time-series chart in `dir` and returns it as an artifact.
    pub fn render(
        &self,
        data: &ChartData,
        dir: &Path,
        run_time: DateTime<Utc>,
    ) -> Result<Artifact, RenderError> {
        if data.observation_points() == 0 {
            return Err(RenderError::EmptyWindow);
        }
        ensure_dir_exists(dir).map_err(|e| RenderError::Io(dir.to_path_buf(), e))?;

        let name = artifact_file_name(ArtifactKind::Chart, run_time, "html");
        let path = dir.join(&name);
        let path_str = path.to_string_lossy().into_owned();
        let frame = self.frame(data)?;

        TimeSeriesPlot::builder()
            .data(&frame)
            .x("time")
            .y("temperature")
            .additional_series(vec!["humidity", "forecast"])
            .size(8)
            .colors(vec![Rgb(235, 117, 0), Rgb(69, 157, 230), Rgb(120, 120, 120)])
            .lines(vec![Line::Solid, Line::Dot, Line::Dash])
            .with_shape(true)
            .shapes(vec![Shape::Circle, Shape::Square, Shape::Diamond])
            .plot_title(Text::from(self.title.as_str()).font("Arial").size(18))
            .legend(&Legend::new().x(0.05).y(0.9))
            .x_title("time")
            .y_title("°C / %")
            .build()
            .write_html(path_str.as_str());

        if !path.is_file() {
            return Err(RenderError::MissingOutput(path));
        }
        let bytes = std::fs::read(&path).map_err(|e| RenderError::Io(path.clone(), e))?;
        info!(
            "Rendered chart with {} observations and {} forecast points to {}",
            data.observation_points(),
            data.forecast_points(),
            path.display()
        );
        Ok(Artifact::new(ArtifactKind::Chart, name, bytes))
    }

    fn frame(&self, data: &ChartData) -> Result<DataFrame, RenderError> {
        let times: Vec<String> = data
            .rows
            .iter()
            .map(|r| r.time.with_timezone(&self.zone).format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        let temperature: Vec<Option<f64>> = data.rows.iter().map(|r| r.temperature).collect();
        let humidity: Vec<Option<f64>> = data.rows.iter().map(|r| r.humidity).collect();
        let forecast: Vec<Option<f64>> = data.rows.iter().map(|r| r.forecast).collect();

        df!(
            "time" => times,
            "temperature" => temperature,
            "humidity" => humidity,
            "forecast" => forecast
        )
        .map_err(RenderError::Frame)
    }
}
