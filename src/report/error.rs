use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot render a chart without observations")]
    EmptyWindow,

    #[error("Failed to assemble chart data")]
    Frame(#[source] PolarsError),

    #[error("Failed to prepare chart output '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Chart was not written to '{0}'")]
    MissingOutput(PathBuf),
}
