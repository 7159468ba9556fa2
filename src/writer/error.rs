use crate::types::observation::WindowError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Cannot serialize non-finite {field} value {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Encoding error writing artifact '{name}'")]
    Serialization {
        name: String,
        #[source]
        source: PolarsError,
    },

    #[error("Artifact '{0}' has no recognised data format extension")]
    UnknownFormat(String),

    #[error("Parsing error reading artifact '{name}'")]
    Parse {
        name: String,
        #[source]
        source: PolarsError,
    },

    #[error("Missing required column '{column}' in artifact '{name}'")]
    MissingColumn { name: String, column: String },

    #[error("Missing value in column '{column}' at row {row} of artifact '{name}'")]
    MissingValue {
        name: String,
        column: String,
        row: usize,
    },

    #[error("Unrecognised timestamp '{value}' in artifact '{name}'")]
    InvalidTimestamp { name: String, value: String },

    #[error("Observations in artifact '{name}' are not a valid window")]
    Window {
        name: String,
        #[source]
        source: WindowError,
    },
}

impl WriteError {
    /// True when a value could not be represented in the output format.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            WriteError::NonFinite { .. } | WriteError::Serialization { .. }
        )
    }
}
