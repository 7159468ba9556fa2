use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid archive key '{0}'")]
    InvalidKey(String),

    #[error("Failed to upload '{key}'")]
    Upload {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object '{0}' already exists with different contents")]
    Conflict(String),

    #[error("Failed to list artifacts under '{prefix}': {message}")]
    List { prefix: String, message: String },

    #[error("Failed to download '{key}'")]
    Download {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
