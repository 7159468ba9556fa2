use crate::archive::error::ArchiveError;
use crate::fetcher::error::FetchError;
use crate::forecast::error::ForecastError;
use crate::pipeline::Stage;
use crate::report::error::RenderError;
use crate::writer::error::WriteError;
use std::path::PathBuf;
use thiserror::Error;

/// The component failure that stopped a run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to save artifact to '{0}'")]
    SaveArtifact(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline failed while {stage}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Stage { stage, .. } => *stage,
        }
    }

    pub fn stage_error(&self) -> &StageError {
        match self {
            PipelineError::Stage { source, .. } => source,
        }
    }
}
