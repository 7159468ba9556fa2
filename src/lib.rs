mod archive;
mod config;
mod error;
mod fetcher;
mod forecast;
mod pipeline;
mod report;
mod types;
mod utils;
mod writer;

pub use error::WeathercastError;

pub use config::*;
pub use pipeline::schedule::{next_top_of_hour, run_with_retries};
pub use pipeline::{RunReport, RunState, Runner, Stage};

pub use archive::fs_store::FsArchiveStore;
pub use archive::{validate_key, ArchiveStore};
pub use fetcher::weather_api::{
    CurrentConditions, WeatherApiFetcher, DEFAULT_CURRENT_ENDPOINT, DEFAULT_ENDPOINT,
};
pub use fetcher::{ObservationSource, MAX_WINDOW_HOURS};
pub use forecast::linear_trend::LinearTrend;
pub use forecast::random_forest::RandomForest;
pub use forecast::{r_squared, ForecastModel, Forecaster, MIN_OBSERVATIONS};
pub use report::{ChartData, ChartRow, ReportRenderer};
pub use writer::{parse_forecasts, parse_observations, ResultWriter};

pub use types::artifact::{artifact_file_name, Artifact, ArtifactKind, DataFormat};
pub use types::forecast::Forecast;
pub use types::observation::{Observation, ObservationWindow, WindowError};

pub use archive::error::ArchiveError;
pub use fetcher::error::FetchError;
pub use forecast::error::ForecastError;
pub use pipeline::error::{PipelineError, StageError};
pub use report::error::RenderError;
pub use writer::error::WriteError;
