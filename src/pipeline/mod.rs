//! The hourly run: fetch, forecast, write, publish, archive, render.

pub mod error;
pub mod schedule;

use crate::archive::fs_store::FsArchiveStore;
use crate::archive::ArchiveStore;
use crate::config::Config;
use crate::error::WeathercastError;
use crate::fetcher::weather_api::WeatherApiFetcher;
use crate::fetcher::ObservationSource;
use crate::forecast::Forecaster;
use crate::pipeline::error::{PipelineError, StageError};
use crate::report::ReportRenderer;
use crate::types::artifact::{Artifact, ArtifactKind};
use crate::types::forecast::Forecast;
use crate::writer::{parse_forecasts, ResultWriter};
use bon::bon;
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::PathBuf;

/// A step of the run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Forecasting,
    Writing,
    Publishing,
    Archiving,
    Rendering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Forecasting => "forecasting",
            Stage::Writing => "writing",
            Stage::Publishing => "publishing",
            Stage::Archiving => "archiving",
            Stage::Rendering => "rendering",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running(Stage),
    Done,
    Failed(Stage),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed(_))
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observations_key: String,
    pub forecast_key: String,
    pub chart_key: String,
    pub forecast: Forecast,
    pub observation_count: usize,
    /// Archived forecast points drawn on the chart, including this run's.
    pub history_points: usize,
}

/// Drives one run at a time through every stage, stopping at the first failure.
///
/// Artifacts already uploaded when a later stage fails stay in the store.
///
/// ```no_run
/// # use weathercast::{Config, Runner};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::from_file("weathercast.toml".as_ref())?;
/// let mut runner = Runner::from_config(&config)?;
/// let report = runner.run(chrono::Utc::now())?;
/// println!("Forecast {:.1} °C", report.forecast.predicted_temperature);
/// # Ok(())
/// # }
/// ```
pub struct Runner {
    source: Box<dyn ObservationSource>,
    forecaster: Box<dyn Forecaster>,
    store: Box<dyn ArchiveStore>,
    writer: ResultWriter,
    renderer: ReportRenderer,
    location: String,
    window_hours: usize,
    prefix: String,
    work_dir: PathBuf,
    zone: FixedOffset,
    state: RunState,
}

#[bon]
impl Runner {
    #[builder]
    pub fn new(
        source: Box<dyn ObservationSource>,
        forecaster: Box<dyn Forecaster>,
        store: Box<dyn ArchiveStore>,
        writer: ResultWriter,
        renderer: ReportRenderer,
        #[builder(into)] location: String,
        window_hours: Option<usize>,
        #[builder(into)] prefix: Option<String>,
        work_dir: PathBuf,
        zone: FixedOffset,
    ) -> Self {
        Self {
            source,
            forecaster,
            store,
            writer,
            renderer,
            location,
            window_hours: window_hours.unwrap_or(10),
            prefix: prefix.unwrap_or_else(|| "weather_data".to_string()),
            work_dir,
            zone,
            state: RunState::Idle,
        }
    }
}

impl Runner {
    /// Wires the provider fetcher, the configured forecaster and the filesystem
    /// archive store from `config`.
    pub fn from_config(config: &Config) -> Result<Self, WeathercastError> {
        let zone = config.output.zone;
        let mut source = WeatherApiFetcher::new(
            &config.provider.endpoint,
            &config.provider.api_key,
            zone,
            config.provider.timeout(),
        )?;
        if config.provider.include_current {
            source = source.with_current(&config.provider.current_endpoint);
        }
        let store = FsArchiveStore::new(&config.archive.root, &config.archive.bucket)?;

        Ok(Runner::builder()
            .source(Box::new(source))
            .forecaster(config.forecast.build())
            .store(Box::new(store))
            .writer(ResultWriter::new(config.output.format, zone))
            .renderer(ReportRenderer::new(zone, config.chart_title()))
            .location(config.provider.location.as_str())
            .window_hours(config.provider.window_hours)
            .prefix(config.archive.prefix.as_str())
            .work_dir(config.work_dir()?)
            .zone(zone)
            .build())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Executes one full run as of `now`. Each call starts again from [`RunState::Idle`].
    pub fn run(&mut self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        self.state = RunState::Idle;
        info!("Starting weather run for '{}' at {}", self.location, now);

        match self.execute(now) {
            Ok(report) => {
                self.state = RunState::Done;
                info!(
                    "Run complete: forecast {:.2} at {} (fit {:.3}), {} archived forecast points",
                    report.forecast.predicted_temperature,
                    report.forecast.target,
                    report.forecast.fit_score,
                    report.history_points
                );
                Ok(report)
            }
            Err(e) => {
                self.state = RunState::Failed(e.stage());
                error!("Run failed while {}: {}", e.stage(), e.stage_error());
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Entering stage {}", stage);
        self.state = RunState::Running(stage);
    }

    fn execute(&mut self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        self.enter(Stage::Fetching);
        let window = self
            .source
            .fetch(&self.location, self.window_hours, now)
            .map_err(failed(Stage::Fetching))?;
        info!("Data fetched: {} hourly observations", window.len());

        self.enter(Stage::Forecasting);
        let forecast = self
            .forecaster
            .fit(&window)
            .map_err(failed(Stage::Forecasting))?;
        info!(
            "Forecast ({}): {:.2} at {}",
            forecast.model, forecast.predicted_temperature, forecast.target
        );

        self.enter(Stage::Writing);
        let (observations, forecast_artifact) = self
            .writer
            .write(&window, &forecast, now)
            .map_err(failed(Stage::Writing))?;
        for artifact in [&observations, &forecast_artifact] {
            let path = artifact
                .save_to(&self.work_dir)
                .map_err(|e| StageError::SaveArtifact(self.work_dir.clone(), e))
                .map_err(failed(Stage::Writing))?;
            info!("Data saved to {}", path.display());
        }

        self.enter(Stage::Publishing);
        let observations_key = self
            .publish(&observations)
            .map_err(failed(Stage::Publishing))?;
        let forecast_key = self
            .publish(&forecast_artifact)
            .map_err(failed(Stage::Publishing))?;

        self.enter(Stage::Archiving);
        let history = self.load_history().map_err(failed(Stage::Archiving))?;

        self.enter(Stage::Rendering);
        let data = self
            .renderer
            .compose(&window, &history)
            .map_err(failed(Stage::Rendering))?;
        let chart = self
            .renderer
            .render(&data, &self.work_dir, now)
            .map_err(failed(Stage::Rendering))?;
        let chart_key = self.publish(&chart).map_err(failed(Stage::Rendering))?;

        Ok(RunReport {
            observations_key,
            forecast_key,
            chart_key,
            forecast,
            observation_count: window.len(),
            history_points: data.forecast_points(),
        })
    }

    fn publish(&self, artifact: &Artifact) -> Result<String, StageError> {
        let key = artifact.key(&self.prefix);
        self.store.upload(&key, &artifact.bytes)?;
        info!("Uploaded {} to archive", key);
        Ok(key)
    }

    /// Downloads and parses every archived forecast. Artifacts that cannot be
    /// parsed are skipped.
    fn load_history(&self) -> Result<Vec<Forecast>, StageError> {
        let prefix = ArtifactKind::Forecast.key_prefix(&self.prefix);
        let keys = self.store.list_artifacts(&prefix)?;
        debug!("Found {} archived forecast artifacts under {}", keys.len(), prefix);

        let mut history = Vec::new();
        for key in keys {
            let bytes = self.store.download(&key)?;
            let name = key.rsplit('/').next().unwrap_or(&key);
            match parse_forecasts(name, &bytes, self.zone) {
                Ok(forecasts) => history.extend(forecasts),
                Err(e) => warn!("Skipping archived forecast {}: {}", key, e),
            }
        }
        Ok(history)
    }
}

fn failed<E: Into<StageError>>(stage: Stage) -> impl FnOnce(E) -> PipelineError {
    move |e| PipelineError::Stage {
        stage,
        source: e.into(),
    }
}
