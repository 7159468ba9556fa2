//! Artifacts are the files a run produces: the observation window, the forecast,
//! and the rendered chart. Each one knows its archive key and can save itself
//! into the local working directory.

use crate::utils::ensure_dir_exists;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Flat-file encoding used for observation and forecast artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Csv,
    Json,
}

impl DataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
        }
    }

    /// Picks the format from a file name or archive key by its extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Observations,
    Forecast,
    Chart,
}

impl ArtifactKind {
    /// Directory under the archive prefix holding artifacts of this kind.
    pub fn directory(&self) -> &'static str {
        match self {
            ArtifactKind::Observations => "observations",
            ArtifactKind::Forecast => "forecasts",
            ArtifactKind::Chart => "charts",
        }
    }

    pub(crate) fn file_stem(&self) -> &'static str {
        match self {
            ArtifactKind::Observations => "weather",
            ArtifactKind::Forecast => "forecast",
            ArtifactKind::Chart => "chart",
        }
    }

    /// Key prefix under which all artifacts of this kind are stored.
    pub fn key_prefix(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/", self.directory())
        } else {
            format!("{}/{}/", prefix, self.directory())
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory())
    }
}

/// Builds the file name for an artifact produced by the run started at `run_time`,
/// e.g. `forecast_20250425140000.csv`.
pub fn artifact_file_name(kind: ArtifactKind, run_time: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        kind.file_stem(),
        run_time.format("%Y%m%d%H%M%S"),
        extension
    )
}

/// A named file produced by a run, held in memory until it is saved and uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, name: String, bytes: Vec<u8>) -> Self {
        Self { kind, name, bytes }
    }

    /// The object key this artifact is uploaded under.
    pub fn key(&self, prefix: &str) -> String {
        format!("{}{}", self.kind.key_prefix(prefix), self.name)
    }

    /// Writes the artifact into `dir`, creating the directory if needed.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        ensure_dir_exists(dir)?;
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}
