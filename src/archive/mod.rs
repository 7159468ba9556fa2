//! The durable object store holding every artifact ever produced.

pub mod error;
pub mod fs_store;

use crate::archive::error::ArchiveError;

/// A bucket-style object store addressed by `/`-separated keys.
///
/// Objects are write-once. Uploading the same bytes under an existing key
/// succeeds, so a retried upload is harmless; different bytes under an existing
/// key are refused. Nothing in this crate deletes objects.
pub trait ArchiveStore {
    /// Stores `bytes` under `key`, failing with [`ArchiveError::Conflict`] if the
    /// key already holds different bytes.
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), ArchiveError>;

    /// Lists every key starting with `prefix`, sorted. No matches is an empty list.
    fn list_artifacts(&self, prefix: &str) -> Result<Vec<String>, ArchiveError>;

    /// Fetches the object stored under `key`.
    fn download(&self, key: &str) -> Result<Vec<u8>, ArchiveError>;
}

/// Checks that `key` is a relative, `/`-separated path without `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<(), ArchiveError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(ArchiveError::InvalidKey(key.to_string()))
    }
}
