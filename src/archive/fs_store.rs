use crate::archive::error::ArchiveError;
use crate::archive::{validate_key, ArchiveStore};
use glob::{glob, Pattern};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// An [`ArchiveStore`] backed by a directory per bucket, e.g. a mounted bucket.
///
/// The object `weather_data/forecasts/forecast_1.csv` in bucket `weather-etl`
/// under root `/srv/buckets` lives at
/// `/srv/buckets/weather-etl/weather_data/forecasts/forecast_1.csv`.
pub struct FsArchiveStore {
    bucket_dir: PathBuf,
}

impl FsArchiveStore {
    pub fn new(root: &Path, bucket: &str) -> Result<Self, ArchiveError> {
        validate_key(bucket)?;
        Ok(Self {
            bucket_dir: root.join(bucket),
        })
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.bucket_dir.clone(), |path, segment| path.join(segment))
    }

    /// Converts a file path inside the bucket back into its key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.bucket_dir).ok()?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }
}

impl ArchiveStore for FsArchiveStore {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        validate_key(key)?;
        let path = self.object_path(key);
        let upload_err = |source| ArchiveError::Upload {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(upload_err)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes).map_err(upload_err)?;
                debug!("Stored {} bytes at {}", bytes.len(), path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read(&path).map_err(upload_err)?;
                if existing == bytes {
                    debug!("{} already holds these {} bytes", key, bytes.len());
                    Ok(())
                } else {
                    Err(ArchiveError::Conflict(key.to_string()))
                }
            }
            Err(e) => Err(upload_err(e)),
        }
    }

    fn list_artifacts(&self, prefix: &str) -> Result<Vec<String>, ArchiveError> {
        let pattern = format!(
            "{}/**/*",
            Pattern::escape(&self.bucket_dir.to_string_lossy())
        );
        let entries = glob(&pattern).map_err(|e| ArchiveError::List {
            prefix: prefix.to_string(),
            message: e.to_string(),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => match self.key_for(&path) {
                    Some(key) if key.starts_with(prefix) => keys.push(key),
                    Some(_) => {}
                    None => warn!("Skipping non UTF-8 object path {}", path.display()),
                },
                Ok(_) => {}
                Err(e) => {
                    return Err(ArchiveError::List {
                        prefix: prefix.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn download(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        validate_key(key)?;
        fs::read(self.object_path(key)).map_err(|source| ArchiveError::Download {
            key: key.to_string(),
            source,
        })
    }
}
