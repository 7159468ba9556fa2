use crate::archive::error::ArchiveError;
use crate::config::ConfigError;
use crate::fetcher::error::FetchError;
use crate::pipeline::error::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeathercastError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
