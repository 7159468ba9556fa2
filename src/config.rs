//! Pipeline configuration, loaded from a TOML file.
//!
//! ```toml
//! [provider]
//! api_key = "..."            # or set WEATHER_API_KEY
//! location = "Mount Pleasant, MI, US"
//! window_hours = 10
//! include_current = false
//!
//! [archive]
//! root = "/srv/buckets"
//! bucket = "weather-etl"
//! prefix = "weather_data"
//!
//! [output]
//! format = "csv"
//! utc_offset = "-04:00"
//!
//! [forecast]
//! model = "random_forest"
//! trees = 100
//!
//! [schedule]
//! retries = 1
//! retry_delay_secs = 300
//! ```

use crate::fetcher::weather_api::{DEFAULT_CURRENT_ENDPOINT, DEFAULT_ENDPOINT};
use crate::fetcher::MAX_WINDOW_HOURS;
use crate::forecast::ForecastModel;
use crate::types::artifact::DataFormat;
use crate::utils::default_work_dir;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse configuration file '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("No provider credential: set provider.api_key or {API_KEY_ENV}")]
    MissingCredential,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No output.work_dir configured and no user cache directory available")]
    NoWorkDir,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub location: String,
    #[serde(default = "default_window_hours")]
    pub window_hours: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Also request current conditions and append them as the newest reading.
    #[serde(default)]
    pub include_current: bool,
    #[serde(default = "default_current_endpoint")]
    pub current_endpoint: String,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: DataFormat,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(
        rename = "utc_offset",
        default = "default_zone",
        deserialize_with = "deserialize_offset"
    )]
    pub zone: FixedOffset,
    #[serde(default)]
    pub chart_title: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: DataFormat::default(),
            work_dir: None,
            zone: default_zone(),
            chart_title: None,
        }
    }
}

/// Retry policy for the built-in hourly loop. A single run never retries.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub forecast: ForecastModel,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_current_endpoint() -> String {
    DEFAULT_CURRENT_ENDPOINT.to_string()
}

fn default_window_hours() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_prefix() -> String {
    "weather_data".to_string()
}

fn default_zone() -> FixedOffset {
    Utc.fix()
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn deserialize_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.trim().parse::<FixedOffset>().map_err(|e| {
        serde::de::Error::custom(format!("invalid utc_offset '{}': {}", value, e))
    })
}

impl Config {
    /// Loads the configuration file at `path`, letting `WEATHER_API_KEY` override
    /// the provider credential.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let toml = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let mut config: Config =
            toml::from_str(&toml).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.provider.api_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        if self.provider.location.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.location is empty".into()));
        }
        if self.provider.window_hours == 0 || self.provider.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "provider.window_hours must be between 1 and {}",
                MAX_WINDOW_HOURS
            )));
        }
        if self.archive.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("archive.bucket is empty".into()));
        }
        Ok(())
    }

    /// Local directory artifacts are saved to before upload.
    pub fn work_dir(&self) -> Result<PathBuf, ConfigError> {
        self.output
            .work_dir
            .clone()
            .or_else(default_work_dir)
            .ok_or(ConfigError::NoWorkDir)
    }

    pub fn chart_title(&self) -> String {
        self.output
            .chart_title
            .clone()
            .unwrap_or_else(|| format!("Weather at {}", self.provider.location))
    }
}
